//! Client-local key-value persistence
//!
//! Holds the device identifier, the UI language, the theme and the
//! "has visited before" flag. Values are plain strings; there is no schema
//! evolution.

use percept_common::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

pub const KEY_DEVICE_ID: &str = "device_id";
pub const KEY_LANGUAGE: &str = "language";
pub const KEY_THEME: &str = "theme";
pub const KEY_HAS_VISITED: &str = "has_visited";

/// Simple string key-value store
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Volatile store, one per process
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON file store; the whole map is rewritten on every `set`
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store, starting empty when the file is missing or unreadable
    pub fn open(path: &Path) -> Self {
        let values = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Discarding unreadable preferences file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&*values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Supported UI languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    En,
    Zh,
    Es,
    Fr,
    De,
    Ja,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::Ja => "ja",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Language::En),
            "zh" => Some(Language::Zh),
            "es" => Some(Language::Es),
            "fr" => Some(Language::Fr),
            "de" => Some(Language::De),
            "ja" => Some(Language::Ja),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

/// Typed access to the persisted UI preferences
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn LocalStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Saved language, `en` when unset or unknown
    pub fn language(&self) -> Language {
        self.store
            .get(KEY_LANGUAGE)
            .and_then(|code| Language::from_code(&code))
            .unwrap_or_default()
    }

    pub fn set_language(&self, language: Language) -> Result<()> {
        self.store.set(KEY_LANGUAGE, language.code())
    }

    /// Only an explicit `dark` selects the dark theme
    pub fn theme(&self) -> Theme {
        match self.store.get(KEY_THEME).as_deref() {
            Some("dark") => Theme::Dark,
            _ => Theme::Light,
        }
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store.set(KEY_THEME, theme.as_str())
    }

    /// Flip the theme and persist the new value
    pub fn toggle_theme(&self) -> Result<Theme> {
        let next = match self.theme() {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn has_visited(&self) -> bool {
        self.store.get(KEY_HAS_VISITED).as_deref() == Some("true")
    }

    pub fn mark_visited(&self) -> Result<()> {
        self.store.set(KEY_HAS_VISITED, "true")
    }
}
