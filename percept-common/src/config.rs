//! Configuration loading and root folder resolution
//!
//! Resolution order for the root folder:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `PERCEPT_ROOT_FOLDER`
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed config file never stops startup: it is logged and
//! the compiled defaults are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const ROOT_FOLDER_ENV: &str = "PERCEPT_ROOT_FOLDER";
pub const LOG_LEVEL_ENV: &str = "PERCEPT_LOG_LEVEL";

/// Upper bound on search results, whatever the config file says
pub const MAX_SEARCH_RESULTS: i64 = 5;

const DATABASE_FILE: &str = "percept.db";
const PREFS_FILE: &str = "prefs.json";

/// Compiled fallback values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub log_level: Option<String>,
    pub event_capacity: Option<usize>,
    pub page_size: Option<i64>,
    pub search_limit: Option<i64>,
    pub comment_limit: Option<i64>,
    pub activity_ratings: Option<i64>,
    pub activity_comments: Option<i64>,
    pub activity_limit: Option<usize>,
    pub scrolling_comments: Option<i64>,
    pub poll_interval_ms: Option<u64>,
}

impl TomlConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Load a config file, returning defaults (with a warning) when absent or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    debug!("Loaded config file {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Effective client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub root_folder: PathBuf,
    pub log_level: String,
    /// Capacity of the change-event and refresh channels
    pub event_capacity: usize,
    /// Professions per directory page
    pub page_size: i64,
    pub search_limit: i64,
    /// Comments shown in the detail view
    pub comment_limit: i64,
    pub activity_ratings: i64,
    pub activity_comments: i64,
    pub activity_limit: usize,
    pub scrolling_comments: i64,
    /// How often `watch` reads the database for other processes' writes
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            root_folder: defaults.root_folder,
            log_level: defaults.log_level,
            event_capacity: 1000,
            page_size: 8,
            search_limit: 5,
            comment_limit: 10,
            activity_ratings: 10,
            activity_comments: 5,
            activity_limit: 10,
            scrolling_comments: 20,
            poll_interval_ms: 1000,
        }
    }
}

impl ClientConfig {
    /// Resolve the configuration from CLI, environment, config file and defaults
    pub fn load(cli_root_folder: Option<&str>) -> Self {
        let toml_config = config_file_path()
            .map(|path| TomlConfig::load_or_default(&path))
            .unwrap_or_default();
        Self::resolve(cli_root_folder, toml_config)
    }

    /// Apply the resolution order over an already-parsed config file
    pub fn resolve(cli_root_folder: Option<&str>, toml_config: TomlConfig) -> Self {
        let mut config = Self::default();

        config.root_folder = RootFolderResolver::new(cli_root_folder, toml_config.root_folder.clone())
            .resolve();

        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.log_level = level;
        } else if let Some(level) = toml_config.log_level {
            config.log_level = level;
        }

        if let Some(v) = toml_config.event_capacity.filter(|v| *v > 0) {
            config.event_capacity = v;
        }
        if let Some(v) = toml_config.page_size.filter(|v| *v > 0) {
            config.page_size = v;
        }
        if let Some(v) = toml_config.search_limit.filter(|v| *v > 0) {
            config.search_limit = v.min(MAX_SEARCH_RESULTS);
        }
        if let Some(v) = toml_config.comment_limit.filter(|v| *v > 0) {
            config.comment_limit = v;
        }
        if let Some(v) = toml_config.activity_ratings.filter(|v| *v >= 0) {
            config.activity_ratings = v;
        }
        if let Some(v) = toml_config.activity_comments.filter(|v| *v >= 0) {
            config.activity_comments = v;
        }
        if let Some(v) = toml_config.activity_limit {
            config.activity_limit = v;
        }
        if let Some(v) = toml_config.scrolling_comments.filter(|v| *v >= 0) {
            config.scrolling_comments = v;
        }
        if let Some(v) = toml_config.poll_interval_ms.filter(|v| *v > 0) {
            config.poll_interval_ms = v;
        }

        config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    /// Client-local key-value store (device id, language, theme, visited flag)
    pub fn prefs_path(&self) -> PathBuf {
        self.root_folder.join(PREFS_FILE)
    }

    /// Create the root folder if it does not exist yet
    pub fn ensure_root_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }
}

/// Root folder resolution following the priority order in the module docs
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    config_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<&str>, config_value: Option<PathBuf>) -> Self {
        Self {
            cli_arg: cli_arg.map(PathBuf::from),
            config_value,
        }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.config_value {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// Platform config file location (`<config_dir>/percept/config.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("percept").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("percept"))
        .unwrap_or_else(|| PathBuf::from("./percept_data"))
}
