//! The local principal.
//!
//! A [`User`] is owned by the session context, mutated only by check-in and
//! alert operations, and dropped on sign-out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Notification preferences, passed around as one explicit value rather than
/// scattered booleans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Pre-expiry reminder offsets, in minutes before the deadline.
    #[serde(default = "default_offsets")]
    pub reminder_offsets_mins: Vec<u32>,
}

fn default_enabled() -> bool {
    true
}

fn default_offsets() -> Vec<u32> {
    vec![60, 30, 10]
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reminder_offsets_mins: default_offsets(),
        }
    }
}

impl NotificationPrefs {
    pub fn offsets(&self) -> Vec<Duration> {
        self.reminder_offsets_mins
            .iter()
            .map(|m| Duration::minutes(i64::from(*m)))
            .collect()
    }
}

/// The user's alert flag with provenance.
///
/// `manual` distinguishes user-triggered alerts from expiry-raised ones:
/// a check-in clears only the latter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFlag {
    pub active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manual: bool,
}

impl AlertFlag {
    pub fn is_manual(&self) -> bool {
        self.active && self.manual
    }

    pub(crate) fn clear(&mut self) {
        self.active = false;
        self.activated_at = None;
        self.manual = false;
    }
}

/// The current user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable user id from the identity provider.
    pub id: String,
    pub display_name: String,
    /// Check-in interval in seconds.
    pub check_in_interval_secs: u64,
    pub last_check_in: DateTime<Utc>,
    #[serde(default)]
    pub alert: AlertFlag,
    #[serde(default)]
    pub prefs: NotificationPrefs,
}

impl User {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        check_in_interval: Duration,
        last_check_in: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            check_in_interval_secs: check_in_interval.num_seconds().max(0) as u64,
            last_check_in,
            alert: AlertFlag::default(),
            prefs: NotificationPrefs::default(),
        }
    }

    pub fn check_in_interval(&self) -> Duration {
        Duration::seconds(self.check_in_interval_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefs_default_offsets_descend_toward_deadline() {
        let prefs = NotificationPrefs::default();
        assert!(prefs.enabled);
        assert_eq!(prefs.reminder_offsets_mins, vec![60, 30, 10]);
        assert_eq!(prefs.offsets()[0], Duration::minutes(60));
    }

    #[test]
    fn alert_flag_clear_resets_provenance() {
        let mut flag = AlertFlag {
            active: true,
            activated_at: Some(Utc::now()),
            manual: true,
        };
        flag.clear();
        assert!(!flag.active);
        assert!(flag.activated_at.is_none());
        assert!(!flag.manual);
    }
}
