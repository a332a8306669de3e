//! Local cache of session state.
//!
//! A JSON snapshot of the current user and their contacts, written by the
//! host after mutations and loaded at sign-in so the engine resumes with the
//! last known clocks across process restarts. The offline queue persists
//! itself separately.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::contact::Contact;
use crate::user::User;

/// Persisted session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedState {
    pub user: User,
    pub contacts: Vec<Contact>,
    pub saved_at: DateTime<Utc>,
}

impl CachedState {
    pub fn new(user: User, contacts: Vec<Contact>, saved_at: DateTime<Utc>) -> Self {
        Self {
            user,
            contacts,
            saved_at,
        }
    }

    fn default_path() -> Result<PathBuf, std::io::Error> {
        Ok(data_dir()?.join("state.json"))
    }

    /// Persist to the default data directory.
    pub fn persist(&self) -> Result<(), std::io::Error> {
        self.persist_to(Self::default_path()?)
    }

    /// Persist to a specific path (for testing).
    pub fn persist_to(&self, path: impl AsRef<Path>) -> Result<(), std::io::Error> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load from the default data directory, `None` when no snapshot exists.
    pub fn load() -> Result<Option<Self>, std::io::Error> {
        Self::load_from(Self::default_path()?)
    }

    /// Load from a specific path (for testing).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Option<Self>, std::io::Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let state: CachedState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::RoleSet;
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn roundtrip_preserves_clocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let now = Utc::now();

        let user = User::new("user-a", "Ana", Duration::hours(24), now);
        let contact = Contact::new(
            "user-b",
            "Bea",
            "+15550100",
            Duration::hours(12),
            now,
            RoleSet::both(),
        );
        let state = CachedState::new(user, vec![contact], now);
        state.persist_to(&path).unwrap();

        let restored = CachedState::load_from(&path).unwrap().unwrap();
        assert_eq!(restored.user.id, "user-a");
        assert_eq!(restored.user.last_check_in, now);
        assert_eq!(restored.contacts.len(), 1);
        assert_eq!(restored.contacts[0].check_in_interval_secs, 12 * 3600);
    }

    #[test]
    fn load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(CachedState::load_from(dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }
}
