//! Responsiveness evaluation and the alert state machine.
//!
//! Per relationship the states are `Responsive -> NonResponsive ->
//! (Acknowledged | Responsive)`; per user, `Normal -> ManualAlertActive ->
//! Normal`. Non-responsiveness and manual alerts are independent flags and
//! are never merged: clearing one leaves the other untouched. Transitions
//! into `NonResponsive` are edge-triggered -- repeated evaluation while
//! already non-responsive emits nothing, and recovery is silent to avoid
//! alert fatigue.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::contact::{Contact, Role};
use crate::error::EngineError;
use crate::events::NotificationIntent;
use crate::registry::ContactRegistry;
use crate::user::User;

/// Reclassify a single contact against the counterpart's clock.
///
/// Recomputes the cached `non_responsive` flag from `last_check_in +
/// interval` and returns a `non-responsive` intent exactly once per
/// transition, targeted at `notify_user_id`. Only dependent-role contacts
/// notify; an active manual alert takes notification precedence and
/// suppresses the duplicate.
pub fn evaluate(
    contact: &mut Contact,
    now: DateTime<Utc>,
    notify_user_id: &str,
) -> Option<NotificationIntent> {
    let was = contact.non_responsive;
    let is = contact.deadline_passed(now);
    contact.non_responsive = is;

    if is && !was {
        info!(contact = %contact.id, "contact became non-responsive");
        if contact.roles.contains(Role::Dependent) && contact.manual_alert.is_none() {
            return Some(NotificationIntent::non_responsive(
                &contact.display_name,
                notify_user_id,
                now,
            ));
        }
    } else if !is && was {
        // Silent on recovery; the acknowledgement resets with it.
        debug!(contact = %contact.id, "contact became responsive again");
        contact.non_responsive_acked = false;
    }

    None
}

/// Reclassify every contact relationship.
pub fn evaluate_all(
    user: &User,
    registry: &mut ContactRegistry,
    now: DateTime<Utc>,
) -> Vec<NotificationIntent> {
    registry
        .iter_mut()
        .filter_map(|contact| evaluate(contact, now, &user.id))
        .collect()
}

/// Raise the current user's manual alert.
///
/// Always succeeds; triggering while already manually active is an
/// idempotent no-op. Returns one `manual-alert` intent per responder-role
/// contact. A manual trigger over an expiry-raised alert upgrades the
/// flag's provenance so a later check-in does not clear it.
pub fn trigger_manual_alert(
    user: &mut User,
    registry: &ContactRegistry,
    now: DateTime<Utc>,
) -> Vec<NotificationIntent> {
    if user.alert.is_manual() {
        return Vec::new();
    }

    if !user.alert.active {
        user.alert.activated_at = Some(now);
    }
    user.alert.active = true;
    user.alert.manual = true;
    info!(user = %user.id, "manual alert raised");

    registry
        .responders()
        .into_iter()
        .map(|c| NotificationIntent::manual_alert(&user.display_name, &c.counterpart_id, now))
        .collect()
}

/// Clear the current user's manual alert.
///
/// A no-op unless a manual alert is active; an expiry-raised alert is the
/// scheduler's to clear on check-in. Each actual transition notifies every
/// responder-role contact.
pub fn clear_manual_alert(
    user: &mut User,
    registry: &ContactRegistry,
    now: DateTime<Utc>,
) -> Vec<NotificationIntent> {
    if !user.alert.is_manual() {
        return Vec::new();
    }

    user.alert.clear();
    info!(user = %user.id, "manual alert cleared");

    registry
        .responders()
        .into_iter()
        .map(|c| {
            NotificationIntent::manual_alert_cleared(&user.display_name, &c.counterpart_id, now)
        })
        .collect()
}

/// Mark an active non-responsive contact as seen.
///
/// The Acknowledged arm of the state machine: suppresses re-display only.
/// Cleared automatically when the counterpart checks in again.
pub fn acknowledge_non_responsive(
    registry: &mut ContactRegistry,
    contact_id: &str,
) -> Result<(), EngineError> {
    let contact = registry.find_mut(contact_id)?;
    if contact.non_responsive {
        contact.non_responsive_acked = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::RoleSet;
    use crate::events::NotificationKind;
    use chrono::Duration;

    fn dependent(last_check_in: DateTime<Utc>) -> Contact {
        Contact::new(
            "user-b",
            "Bea",
            "+15550100",
            Duration::hours(24),
            last_check_in,
            RoleSet::dependent(),
        )
    }

    fn user() -> User {
        User::new("user-a", "Ana", Duration::hours(24), Utc::now())
    }

    #[test]
    fn transition_emits_exactly_once() {
        let t0 = Utc::now();
        let mut c = dependent(t0);
        let t1 = t0 + Duration::hours(24) + Duration::seconds(1);

        let intent = evaluate(&mut c, t1, "user-a").unwrap();
        assert_eq!(intent.kind, NotificationKind::NonResponsive);
        assert!(c.non_responsive);

        // Still non-responsive later: level, not edge -- nothing emitted.
        let t2 = t1 + Duration::hours(5);
        assert!(evaluate(&mut c, t2, "user-a").is_none());
        assert!(c.non_responsive);
    }

    #[test]
    fn recovery_is_silent_and_clears_ack() {
        let t0 = Utc::now();
        let mut c = dependent(t0);
        let t1 = t0 + Duration::hours(25);
        evaluate(&mut c, t1, "user-a").unwrap();
        c.non_responsive_acked = true;

        // Counterpart checks in (mirrored via the store).
        c.last_check_in = t1;
        assert!(evaluate(&mut c, t1 + Duration::minutes(1), "user-a").is_none());
        assert!(!c.non_responsive);
        assert!(!c.non_responsive_acked);
    }

    #[test]
    fn responder_only_contacts_do_not_notify() {
        let t0 = Utc::now();
        let mut c = dependent(t0);
        c.roles = RoleSet::responder();
        let t1 = t0 + Duration::hours(25);
        assert!(evaluate(&mut c, t1, "user-a").is_none());
        // The flag still tracks reality for display.
        assert!(c.non_responsive);
    }

    #[test]
    fn manual_alert_takes_notification_precedence() {
        let t0 = Utc::now();
        let mut c = dependent(t0);
        c.manual_alert = Some(t0);
        let t1 = t0 + Duration::hours(25);
        assert!(evaluate(&mut c, t1, "user-a").is_none());
        assert!(c.non_responsive);
    }

    #[test]
    fn manual_and_non_responsive_flags_are_independent() {
        let t0 = Utc::now();
        let mut u = user();
        let mut reg = ContactRegistry::new();
        let mut c = dependent(t0);
        c.roles = RoleSet::both();
        let id = c.id.clone();
        reg.upsert(c).unwrap();

        // Contact goes non-responsive, then the user raises a manual alert.
        let t1 = t0 + Duration::hours(25);
        let intents = evaluate_all(&u, &mut reg, t1);
        assert_eq!(intents.len(), 1);
        let alert_intents = trigger_manual_alert(&mut u, &reg, t1);
        assert_eq!(alert_intents.len(), 1);

        // Counterpart checks in: non-responsive clears, manual alert stays.
        reg.find_mut(&id).unwrap().last_check_in = t1;
        evaluate_all(&u, &mut reg, t1 + Duration::minutes(1));
        assert!(!reg.find(&id).unwrap().non_responsive);
        assert!(u.alert.is_manual());
    }

    #[test]
    fn trigger_is_idempotent_while_active() {
        let t0 = Utc::now();
        let mut u = user();
        let mut reg = ContactRegistry::new();
        reg.upsert(Contact::new(
            "user-b",
            "Bea",
            "+15550100",
            Duration::hours(24),
            t0,
            RoleSet::responder(),
        ))
        .unwrap();

        assert_eq!(trigger_manual_alert(&mut u, &reg, t0).len(), 1);
        assert!(trigger_manual_alert(&mut u, &reg, t0 + Duration::minutes(1)).is_empty());
        assert_eq!(u.alert.activated_at, Some(t0));

        assert_eq!(clear_manual_alert(&mut u, &reg, t0 + Duration::hours(1)).len(), 1);
        assert!(clear_manual_alert(&mut u, &reg, t0 + Duration::hours(1)).is_empty());
    }

    #[test]
    fn manual_trigger_upgrades_expiry_alert() {
        let t0 = Utc::now();
        let mut u = User::new("user-a", "Ana", Duration::hours(1), t0 - Duration::hours(3));
        let reg = ContactRegistry::new();

        assert!(u.evaluate_self(t0));
        assert!(!u.alert.manual);

        trigger_manual_alert(&mut u, &reg, t0);
        assert!(u.alert.is_manual());
        // Original activation instant is kept.
        assert_eq!(u.alert.activated_at, Some(t0));

        // A check-in no longer clears it.
        u.check_in(t0 + Duration::minutes(5)).unwrap();
        assert!(u.alert.is_manual());
    }

    #[test]
    fn acknowledge_requires_active_non_responsive() {
        let t0 = Utc::now();
        let mut reg = ContactRegistry::new();
        let c = dependent(t0);
        let id = c.id.clone();
        reg.upsert(c).unwrap();

        acknowledge_non_responsive(&mut reg, &id).unwrap();
        assert!(!reg.find(&id).unwrap().non_responsive_acked);

        evaluate_all(&user(), &mut reg, t0 + Duration::hours(25));
        acknowledge_non_responsive(&mut reg, &id).unwrap();
        assert!(reg.find(&id).unwrap().non_responsive_acked);
    }
}
