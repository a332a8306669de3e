//! Contact relationship model.
//!
//! A [`Contact`] is one user's view of a bidirectional relationship, keyed by
//! a relationship id shared with the counterpart. Both sides hold independent
//! values for the same id; the durable store's subscription mechanism keeps
//! them in sync. No live references ever cross sides.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Relationship role held by a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Receives alerts and pings about the current user.
    Responder,
    /// Monitored by the current user.
    Dependent,
}

/// Subset of {responder, dependent} a contact holds.
///
/// Must be non-empty; the registry rejects empty sets at the mutation
/// boundary. A contact may hold both roles simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleSet {
    #[serde(default)]
    pub responder: bool,
    #[serde(default)]
    pub dependent: bool,
}

impl RoleSet {
    pub fn responder() -> Self {
        Self {
            responder: true,
            dependent: false,
        }
    }

    pub fn dependent() -> Self {
        Self {
            responder: false,
            dependent: true,
        }
    }

    pub fn both() -> Self {
        Self {
            responder: true,
            dependent: true,
        }
    }

    pub fn contains(&self, role: Role) -> bool {
        match role {
            Role::Responder => self.responder,
            Role::Dependent => self.dependent,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.responder && !self.dependent
    }
}

/// One ping direction.
///
/// Acknowledgement resets to `Absent` rather than a separate resting state;
/// an acknowledged ping is terminal and immediately actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PingState {
    #[default]
    Absent,
    Pending { sent_at: DateTime<Utc> },
}

impl PingState {
    pub fn is_pending(&self) -> bool {
        matches!(self, PingState::Pending { .. })
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        match self {
            PingState::Pending { sent_at } => Some(*sent_at),
            PingState::Absent => None,
        }
    }
}

/// One user's view of a relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Relationship id, shared by both sides.
    pub id: String,

    /// Stable user id of the counterpart.
    pub counterpart_id: String,

    /// Counterpart display name.
    pub display_name: String,

    /// Counterpart phone number, preformatted by the host.
    pub phone: String,

    /// Counterpart's own check-in interval in seconds (mirrored, read-only
    /// from this side).
    pub check_in_interval_secs: u64,

    /// Counterpart's last check-in (mirrored, read-only from this side).
    pub last_check_in: DateTime<Utc>,

    /// Roles this contact holds relative to the current user.
    pub roles: RoleSet,

    /// Mirror of the counterpart's manual alert. Independent of
    /// `non_responsive`; the two are never merged.
    pub manual_alert: Option<DateTime<Utc>>,

    /// Counterpart pinged the current user.
    #[serde(default)]
    pub incoming_ping: PingState,

    /// Current user pinged the counterpart.
    #[serde(default)]
    pub outgoing_ping: PingState,

    /// Cached result of the last responsiveness evaluation. Display-only;
    /// decision paths recompute from the clock fields.
    #[serde(default)]
    pub non_responsive: bool,

    /// The current user acknowledged an active non-responsive state.
    /// Cleared automatically when the counterpart becomes responsive again.
    #[serde(default)]
    pub non_responsive_acked: bool,
}

impl Contact {
    /// Create a relationship view with a fresh relationship id.
    pub fn new(
        counterpart_id: impl Into<String>,
        display_name: impl Into<String>,
        phone: impl Into<String>,
        check_in_interval: Duration,
        last_check_in: DateTime<Utc>,
        roles: RoleSet,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            counterpart_id: counterpart_id.into(),
            display_name: display_name.into(),
            phone: phone.into(),
            check_in_interval_secs: check_in_interval.num_seconds().max(0) as u64,
            last_check_in,
            roles,
            manual_alert: None,
            incoming_ping: PingState::Absent,
            outgoing_ping: PingState::Absent,
            non_responsive: false,
            non_responsive_acked: false,
        }
    }

    pub fn check_in_interval(&self) -> Duration {
        Duration::seconds(self.check_in_interval_secs as i64)
    }

    /// The counterpart's current deadline, always derived.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.last_check_in + self.check_in_interval()
    }

    /// Pure responsiveness predicate: has the counterpart's deadline passed?
    ///
    /// The `non_responsive` field only caches this for display; anything that
    /// makes a decision calls this instead.
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline()
    }

    /// Fold a counterpart-published snapshot into the mirrored fields.
    ///
    /// Only fields the counterpart owns are touched. The outgoing ping is
    /// cleared when the counterpart's published view shows our ping resolved,
    /// guarded against stale snapshots racing a just-sent ping.
    pub fn apply_counterpart(&mut self, snapshot: CounterpartSnapshot) {
        self.display_name = snapshot.display_name;
        self.phone = snapshot.phone;
        self.check_in_interval_secs = snapshot.check_in_interval_secs;
        self.last_check_in = snapshot.last_check_in;
        self.manual_alert = snapshot.manual_alert;
        self.incoming_ping = snapshot.ping_to_us;

        if let PingState::Pending { sent_at } = self.outgoing_ping {
            if !snapshot.ping_from_us.is_pending() && sent_at < snapshot.published_at {
                self.outgoing_ping = PingState::Absent;
            }
        }
    }
}

/// Counterpart-owned fields of a relationship, as published to the durable
/// store under `contact:{id}` and delivered through its subscription stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterpartSnapshot {
    pub display_name: String,
    pub phone: String,
    pub check_in_interval_secs: u64,
    pub last_check_in: DateTime<Utc>,
    pub manual_alert: Option<DateTime<Utc>>,
    /// The counterpart's outgoing ping, i.e. our incoming.
    #[serde(default)]
    pub ping_to_us: PingState,
    /// The counterpart's record of our ping to them.
    #[serde(default)]
    pub ping_from_us: PingState,
    /// When the counterpart published this snapshot.
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(interval: Duration, last_check_in: DateTime<Utc>) -> Contact {
        Contact::new(
            "user-b",
            "Bea",
            "+15550100",
            interval,
            last_check_in,
            RoleSet::dependent(),
        )
    }

    #[test]
    fn deadline_is_derived_from_clock_fields() {
        let t0 = Utc::now();
        let c = contact(Duration::hours(24), t0);
        assert_eq!(c.deadline(), t0 + Duration::hours(24));
        assert!(!c.deadline_passed(t0 + Duration::hours(24)));
        assert!(c.deadline_passed(t0 + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn role_set_contains_and_both() {
        let both = RoleSet::both();
        assert!(both.contains(Role::Responder));
        assert!(both.contains(Role::Dependent));
        assert!(RoleSet::default().is_empty());
    }

    #[test]
    fn snapshot_updates_mirrored_fields_only() {
        let t0 = Utc::now();
        let mut c = contact(Duration::hours(24), t0);
        c.non_responsive = true;

        let t1 = t0 + Duration::hours(1);
        c.apply_counterpart(CounterpartSnapshot {
            display_name: "Bea R.".into(),
            phone: "+15550100".into(),
            check_in_interval_secs: 12 * 3600,
            last_check_in: t1,
            manual_alert: Some(t1),
            ping_to_us: PingState::Pending { sent_at: t1 },
            ping_from_us: PingState::Absent,
            published_at: t1,
        });

        assert_eq!(c.display_name, "Bea R.");
        assert_eq!(c.last_check_in, t1);
        assert_eq!(c.manual_alert, Some(t1));
        assert!(c.incoming_ping.is_pending());
        // Derived cache is the evaluator's to update, not the snapshot's.
        assert!(c.non_responsive);
    }

    #[test]
    fn snapshot_clears_acknowledged_outgoing_ping() {
        let t0 = Utc::now();
        let mut c = contact(Duration::hours(24), t0);
        c.outgoing_ping = PingState::Pending { sent_at: t0 };

        let snap = |published_at| CounterpartSnapshot {
            display_name: "Bea".into(),
            phone: "+15550100".into(),
            check_in_interval_secs: 24 * 3600,
            last_check_in: t0,
            manual_alert: None,
            ping_to_us: PingState::Absent,
            ping_from_us: PingState::Absent,
            published_at,
        };

        // Stale snapshot published before the ping was sent: keep pending.
        c.apply_counterpart(snap(t0 - Duration::minutes(5)));
        assert!(c.outgoing_ping.is_pending());

        // Fresh snapshot with the ping resolved: clear.
        c.apply_counterpart(snap(t0 + Duration::minutes(5)));
        assert!(!c.outgoing_ping.is_pending());
    }
}
