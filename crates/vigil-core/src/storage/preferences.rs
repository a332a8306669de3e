//! TOML-based engine preferences.
//!
//! Stores the host-configurable knobs:
//! - Notification enablement and pre-expiry reminder offsets
//! - Default check-in interval for new sessions
//! - Replay retry ceiling
//!
//! Stored at `<data_dir>/preferences.toml`.

use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::user::NotificationPrefs;

/// Notification preference section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reminder_offsets")]
    pub reminder_offsets_minutes: Vec<u32>,
}

/// Check-in section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInSection {
    #[serde(default = "default_interval_hours")]
    pub default_interval_hours: u32,
}

/// Offline replay section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Engine preferences.
///
/// Serialized to/from TOML at `<data_dir>/preferences.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub notifications: NotificationSection,
    #[serde(default)]
    pub check_in: CheckInSection,
    #[serde(default)]
    pub replay: ReplaySection,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_reminder_offsets() -> Vec<u32> {
    vec![60, 30, 10]
}
fn default_interval_hours() -> u32 {
    24
}
fn default_max_attempts() -> u32 {
    5
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_offsets_minutes: default_reminder_offsets(),
        }
    }
}

impl Default for CheckInSection {
    fn default() -> Self {
        Self {
            default_interval_hours: default_interval_hours(),
        }
    }
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: NotificationSection::default(),
            check_in: CheckInSection::default(),
            replay: ReplaySection::default(),
        }
    }
}

impl Preferences {
    fn path() -> Result<PathBuf, std::io::Error> {
        Ok(data_dir()?.join("preferences.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default cannot be written.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from(Self::path()?)
    }

    /// Load from a specific path (for testing).
    pub fn load_from(path: PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let prefs: Preferences = toml::from_str(&content)?;
                Ok(prefs)
            }
            Err(_) => {
                let prefs = Self::default();
                prefs.save_to(path)?;
                Ok(prefs)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.save_to(Self::path()?)
    }

    fn save_to(&self, path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from disk, returning the default on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// The notification preference value handed to the engine.
    pub fn notification_prefs(&self) -> NotificationPrefs {
        NotificationPrefs {
            enabled: self.notifications.enabled,
            reminder_offsets_mins: self.notifications.reminder_offsets_minutes.clone(),
        }
    }

    pub fn default_interval(&self) -> Duration {
        Duration::hours(i64::from(self.check_in.default_interval_hours))
    }
}
