//! Pseudo-anonymous device identifier used as the vote-deduplication key
//!
//! Not a credential: anyone can clear local storage and vote again. The
//! backend's (profession, device) uniqueness constraint only stops the same
//! device from voting twice.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::prefs::{LocalStore, KEY_DEVICE_ID};

const SUFFIX_LEN: usize = 10;
const DISPLAY_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate `<unix millis>-<random alphanumeric suffix>`
    pub fn generate() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!("{}-{}", Utc::now().timestamp_millis(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Comment author name: `anon-` plus the last six characters of the token
    pub fn display_name(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let start = chars.len().saturating_sub(DISPLAY_SUFFIX_LEN);
        let tail: String = chars[start..].iter().collect();
        format!("anon-{}", tail)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lazily created, persisted device identity for one session
pub struct DeviceIdentity {
    store: Arc<dyn LocalStore>,
    id: OnceLock<DeviceId>,
}

impl DeviceIdentity {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            id: OnceLock::new(),
        }
    }

    /// Return the persisted identifier, creating and persisting it on first use
    pub fn get_or_create(&self) -> DeviceId {
        self.id
            .get_or_init(|| {
                if let Some(existing) = self.store.get(KEY_DEVICE_ID).filter(|v| !v.is_empty()) {
                    debug!(device_id = %existing, "Loaded device identity");
                    return DeviceId::new(existing);
                }

                let generated = DeviceId::generate();
                if let Err(e) = self.store.set(KEY_DEVICE_ID, generated.as_str()) {
                    // The id still works for this session; it just won't survive a restart
                    warn!("Could not persist device identity: {}", e);
                }
                debug!(device_id = %generated, "Created device identity");
                generated
            })
            .clone()
    }

    pub fn display_name(&self) -> String {
        self.get_or_create().display_name()
    }
}
