//! Check-in scheduling.
//!
//! The scheduler owns the current user's check-in clock. It holds no timers
//! itself -- the surrounding process decides when to evaluate (app
//! foreground, push wake-up, at minimum once per reminder-offset boundary).
//! Evaluation with a fixed `now` is idempotent, so a host may call it as
//! often as it likes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ValidationError;
use crate::user::User;

/// Backwards clock movement accepted on check-in before the timestamp is
/// rejected as non-monotonic.
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 5 * 60;

fn clock_skew_tolerance() -> Duration {
    Duration::seconds(CLOCK_SKEW_TOLERANCE_SECS)
}

/// Transient result of a check-in. The deadline is always derived from
/// `timestamp + interval`, never stored separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub timestamp: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl User {
    /// Record a check-in at `now`.
    ///
    /// Clears an alert that was active solely due to non-responsiveness;
    /// manual alerts survive. Rejects timestamps that move the clock
    /// backwards beyond [`CLOCK_SKEW_TOLERANCE_SECS`].
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<CheckInRecord, ValidationError> {
        if now + clock_skew_tolerance() < self.last_check_in {
            return Err(ValidationError::InvalidTimestamp {
                now,
                last_check_in: self.last_check_in,
            });
        }

        self.last_check_in = now;
        if self.alert.active && !self.alert.manual {
            self.alert.clear();
            info!(user = %self.id, "check-in cleared non-responsive alert");
        }

        Ok(CheckInRecord {
            timestamp: now,
            deadline: self.deadline(),
        })
    }

    /// Change the check-in interval. Not retroactive: the current deadline
    /// moves, but past deadlines are not re-judged.
    pub fn set_interval(&mut self, interval: Duration) -> Result<(), ValidationError> {
        let seconds = interval.num_seconds();
        if seconds <= 0 {
            return Err(ValidationError::InvalidInterval { seconds });
        }
        self.check_in_interval_secs = seconds as u64;
        Ok(())
    }

    /// `last_check_in + interval`, always derived.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.last_check_in + self.check_in_interval()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline()
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline() - now).max(Duration::zero())
    }

    /// Pre-expiry reminder instants for the host to schedule against,
    /// ascending. Empty when notifications are disabled. The engine never
    /// fires these itself; reminders are a host concern, separate from the
    /// evaluator's non-responsiveness edge.
    pub fn reminder_times(&self) -> Vec<DateTime<Utc>> {
        if !self.prefs.enabled {
            return Vec::new();
        }
        let deadline = self.deadline();
        let mut times: Vec<DateTime<Utc>> = self
            .prefs
            .offsets()
            .into_iter()
            .map(|offset| deadline - offset)
            .collect();
        times.sort();
        times.dedup();
        times
    }

    /// Raise the user's own alert flag when their deadline has passed.
    ///
    /// The flag carries non-manual provenance so a later check-in clears it.
    /// Returns whether the flag was raised by this call.
    pub fn evaluate_self(&mut self, now: DateTime<Utc>) -> bool {
        if self.alert.active || !self.is_expired(now) {
            return false;
        }
        self.alert.active = true;
        self.alert.manual = false;
        self.alert.activated_at = Some(now);
        info!(user = %self.id, "own check-in deadline passed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(interval: Duration, last_check_in: DateTime<Utc>) -> User {
        User::new("user-a", "Ana", interval, last_check_in)
    }

    #[test]
    fn check_in_then_is_expired_is_false() {
        let now = Utc::now();
        let mut u = user(Duration::hours(24), now - Duration::days(2));
        u.check_in(now).unwrap();
        assert!(!u.is_expired(now));
    }

    #[test]
    fn expiry_at_24h_plus_one_second() {
        let t0 = Utc::now();
        let mut u = user(Duration::hours(24), t0 - Duration::days(1));
        u.check_in(t0).unwrap();
        assert!(!u.is_expired(t0 + Duration::hours(24)));
        assert!(u.is_expired(t0 + Duration::hours(24) + Duration::seconds(1)));
    }

    #[test]
    fn backwards_timestamp_beyond_tolerance_is_rejected() {
        let t0 = Utc::now();
        let mut u = user(Duration::hours(24), t0);
        let err = u.check_in(t0 - Duration::minutes(6)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
        // Small skew from clock sync is tolerated.
        u.check_in(t0 - Duration::minutes(4)).unwrap();
    }

    #[test]
    fn set_interval_rejects_non_positive() {
        let mut u = user(Duration::hours(24), Utc::now());
        assert!(matches!(
            u.set_interval(Duration::zero()),
            Err(ValidationError::InvalidInterval { .. })
        ));
        assert!(matches!(
            u.set_interval(Duration::seconds(-5)),
            Err(ValidationError::InvalidInterval { .. })
        ));
        u.set_interval(Duration::hours(12)).unwrap();
        assert_eq!(u.check_in_interval(), Duration::hours(12));
    }

    #[test]
    fn check_in_clears_expiry_alert_but_not_manual() {
        let t0 = Utc::now();
        let mut u = user(Duration::hours(1), t0 - Duration::hours(3));
        assert!(u.evaluate_self(t0));
        assert!(u.alert.active);

        u.check_in(t0).unwrap();
        assert!(!u.alert.active);

        // Manual alerts survive a check-in.
        u.alert.active = true;
        u.alert.manual = true;
        u.alert.activated_at = Some(t0);
        u.check_in(t0 + Duration::minutes(1)).unwrap();
        assert!(u.alert.active);
    }

    #[test]
    fn evaluate_self_is_edge_triggered_on_the_flag() {
        let t0 = Utc::now();
        let mut u = user(Duration::hours(1), t0 - Duration::hours(3));
        assert!(u.evaluate_self(t0));
        assert!(!u.evaluate_self(t0 + Duration::minutes(1)));
    }

    #[test]
    fn reminder_times_ascend_and_respect_enabled() {
        let t0 = Utc::now();
        let mut u = user(Duration::hours(24), t0);
        let times = u.reminder_times();
        assert_eq!(times.len(), 3);
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*times.last().unwrap(), u.deadline() - Duration::minutes(10));

        u.prefs.enabled = false;
        assert!(u.reminder_times().is_empty());
    }

    proptest! {
        // A freshly checked-in user is never immediately expired, for any
        // positive interval up to ten years.
        #[test]
        fn fresh_check_in_never_expired(secs in 1i64..315_360_000i64) {
            let now = Utc::now();
            let mut u = user(Duration::seconds(secs), now - Duration::days(400 * 10));
            u.check_in(now).unwrap();
            prop_assert!(!u.is_expired(now));
        }

        // The deadline is a pure function of (last_check_in, interval).
        #[test]
        fn deadline_is_pure(secs in 1i64..315_360_000i64) {
            let now = Utc::now();
            let mut u = user(Duration::seconds(secs), now - Duration::days(1));
            u.check_in(now).unwrap();
            prop_assert_eq!(u.deadline(), now + Duration::seconds(secs));
            prop_assert_eq!(u.deadline(), u.deadline());
        }
    }
}
