//! Notification intents.
//!
//! The engine performs no push delivery itself. Every operation that should
//! reach a device produces a [`NotificationIntent`] value; the host hands it
//! to whatever transport it uses. At most one `non-responsive` intent is
//! produced per unbroken non-responsive period per contact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind discriminant for a notification intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    NonResponsive,
    ManualAlert,
    Ping,
    PingCleared,
    ContactAdded,
    ContactRemoved,
    RoleChanged,
}

/// A notification the host should deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Stable user id of the device the notification is for.
    pub target_user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationIntent {
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        target_user_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            target_user_id: target_user_id.into(),
            timestamp,
        }
    }

    /// A monitored contact missed their check-in deadline.
    pub fn non_responsive(contact_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::NonResponsive,
            "Contact may need help",
            format!("{contact_name} has not checked in within their scheduled interval."),
            target,
            at,
        )
    }

    /// The current user raised an emergency alert.
    pub fn manual_alert(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::ManualAlert,
            "Emergency alert",
            format!("{user_name} triggered an emergency alert."),
            target,
            at,
        )
    }

    /// The current user cleared their emergency alert.
    ///
    /// The transport contract has no separate kind for clearing; both
    /// transitions notify responders under `manual-alert`.
    pub fn manual_alert_cleared(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::ManualAlert,
            "Alert cleared",
            format!("{user_name} cleared their emergency alert."),
            target,
            at,
        )
    }

    /// Request for the target to confirm status.
    pub fn ping(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::Ping,
            "Status check",
            format!("{user_name} asked you to confirm you're OK."),
            target,
            at,
        )
    }

    /// A previously sent ping was acknowledged.
    pub fn ping_cleared(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::PingCleared,
            "Status confirmed",
            format!("{user_name} confirmed they're OK."),
            target,
            at,
        )
    }

    pub fn contact_added(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::ContactAdded,
            "New contact",
            format!("{user_name} added you as a contact."),
            target,
            at,
        )
    }

    pub fn contact_removed(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::ContactRemoved,
            "Contact removed",
            format!("{user_name} removed you as a contact."),
            target,
            at,
        )
    }

    pub fn role_changed(user_name: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::RoleChanged,
            "Roles updated",
            format!("{user_name} updated your roles."),
            target,
            at,
        )
    }
}
