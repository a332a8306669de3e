//! Session lifecycle and the engine facade.
//!
//! All engine state lives behind one [`Engine`] per signed-in session; the
//! host serializes access to it (one actor or worker per session). The
//! engine itself is synchronous and performs no I/O: operations mutate local
//! state and return notification intents for the host to deliver. While the
//! host reports connectivity loss, mutating operations are diverted into the
//! offline queue instead and replayed in order later.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::alert;
use crate::checkin::CheckInRecord;
use crate::contact::{Contact, CounterpartSnapshot, RoleSet};
use crate::error::{EngineError, Result, TransientIoError};
use crate::events::NotificationIntent;
use crate::ping::{self, RespondReport};
use crate::queue::{CancelFlag, OfflineAction, OfflineQueue, ReplayReport};
use crate::registry::ContactRegistry;
use crate::storage::CachedState;
use crate::store::{IdentityProvider, StoreKey};
use crate::user::User;

/// One signed-in session, created from the identity provider at sign-in and
/// torn down at sign-out.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
}

impl SessionContext {
    /// Build a session for the currently authenticated user.
    pub fn establish(identity: &dyn IdentityProvider, now: DateTime<Utc>) -> Result<Self> {
        let user_id = identity.current_user().ok_or(EngineError::NotAuthenticated)?;
        Ok(Self {
            user_id,
            started_at: now,
        })
    }
}

/// The check-in & alert engine for one session.
pub struct Engine {
    session: SessionContext,
    user: User,
    registry: ContactRegistry,
    queue: OfflineQueue,
    cancel: CancelFlag,
    online: bool,
}

impl Engine {
    /// Start a session for `user`. The session identity must match the
    /// user record.
    pub fn sign_in(session: SessionContext, user: User, queue: OfflineQueue) -> Result<Self> {
        if session.user_id != user.id {
            return Err(EngineError::NotAuthenticated);
        }
        info!(user = %user.id, "session started");
        Ok(Self {
            session,
            user,
            registry: ContactRegistry::new(),
            queue,
            cancel: CancelFlag::new(),
            online: true,
        })
    }

    /// Start a session from a cached snapshot, restoring the last known
    /// clocks and contacts.
    pub fn resume(session: SessionContext, state: CachedState, queue: OfflineQueue) -> Result<Self> {
        if session.user_id != state.user.id {
            return Err(EngineError::NotAuthenticated);
        }
        info!(user = %state.user.id, "session resumed from cache");
        Ok(Self {
            session,
            user: state.user,
            registry: ContactRegistry::from_contacts(state.contacts),
            queue,
            cancel: CancelFlag::new(),
            online: true,
        })
    }

    /// End the session: halt any in-flight replay at the next item boundary,
    /// persist the pending queue, and drop all user state.
    pub fn sign_out(self) -> Result<()> {
        self.cancel.cancel();
        self.queue.persist()?;
        info!(user = %self.user.id, "session ended");
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn registry(&self) -> &ContactRegistry {
        &self.registry
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Cancellation handle for a host driving replay from another callback.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Host-reported connectivity. While offline, mutating operations are
    /// queued instead of returned as live intents.
    pub fn set_online(&mut self, online: bool) {
        if self.online != online {
            debug!(online, "connectivity changed");
        }
        self.online = online;
    }

    /// Snapshot for the local cache.
    pub fn cached_state(&self, now: DateTime<Utc>) -> CachedState {
        CachedState::new(
            self.user.clone(),
            self.registry.contacts().to_vec(),
            now,
        )
    }

    // ── Check-in & alerts ────────────────────────────────────────────

    /// Record a check-in. Always succeeds locally (aside from invalid
    /// timestamps); a store write that later fails is queued for replay
    /// rather than rolled back.
    pub fn check_in(&mut self, now: DateTime<Utc>) -> Result<CheckInRecord> {
        let record = self.user.check_in(now)?;
        self.sync_user(now);
        Ok(record)
    }

    pub fn set_interval(&mut self, interval: Duration, now: DateTime<Utc>) -> Result<()> {
        self.user.set_interval(interval)?;
        self.sync_user(now);
        Ok(())
    }

    /// Reclassify every contact relationship and the user's own deadline.
    ///
    /// Idempotent for a fixed `now`. Returned intents target the current
    /// user's own device and are never queued.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        self.user.evaluate_self(now);
        alert::evaluate_all(&self.user, &mut self.registry, now)
    }

    /// Raise the manual emergency alert and notify every responder.
    pub fn trigger_alert(&mut self, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let intents = alert::trigger_manual_alert(&mut self.user, &self.registry, now);
        if !intents.is_empty() {
            self.sync_user(now);
        }
        self.route_intents(intents, now)
    }

    /// Clear the manual emergency alert and notify every responder.
    pub fn clear_alert(&mut self, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let intents = alert::clear_manual_alert(&mut self.user, &self.registry, now);
        if !intents.is_empty() {
            self.sync_user(now);
        }
        self.route_intents(intents, now)
    }

    pub fn acknowledge_non_responsive(&mut self, contact_id: &str) -> Result<()> {
        alert::acknowledge_non_responsive(&mut self.registry, contact_id)
    }

    // ── Contacts ─────────────────────────────────────────────────────

    pub fn add_contact(
        &mut self,
        contact: Contact,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>> {
        let counterpart = contact.counterpart_id.clone();
        self.registry.upsert(contact.clone())?;
        if !self.online {
            self.queue.enqueue(OfflineAction::AddContact { contact }, now);
        }
        let intent = NotificationIntent::contact_added(&self.user.display_name, &counterpart, now);
        Ok(self.route_intents(vec![intent], now))
    }

    /// Remove a relationship. Idempotent: removing an unknown id produces
    /// nothing.
    pub fn remove_contact(&mut self, contact_id: &str, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let Some(removed) = self.registry.remove(contact_id) else {
            return Vec::new();
        };
        if !self.online {
            self.queue.enqueue(
                OfflineAction::RemoveContact {
                    contact_id: contact_id.to_string(),
                },
                now,
            );
        }
        let intent = NotificationIntent::contact_removed(
            &self.user.display_name,
            &removed.counterpart_id,
            now,
        );
        self.route_intents(vec![intent], now)
    }

    pub fn set_contact_roles(
        &mut self,
        contact_id: &str,
        roles: RoleSet,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>> {
        let counterpart = self.registry.set_roles(contact_id, roles)?.counterpart_id.clone();
        self.sync_contact(contact_id, now);
        let intent = NotificationIntent::role_changed(&self.user.display_name, &counterpart, now);
        Ok(self.route_intents(vec![intent], now))
    }

    /// Fold a store-subscription update of a counterpart's view into the
    /// registry.
    pub fn apply_counterpart_snapshot(
        &mut self,
        contact_id: &str,
        snapshot: CounterpartSnapshot,
    ) -> Result<()> {
        let contact = self.registry.find_mut(contact_id)?;
        contact.apply_counterpart(snapshot);
        Ok(())
    }

    /// Convenience for hosts draining raw `subscribe` streams: parses and
    /// folds a document published under `key`.
    pub fn fold_subscription(&mut self, key: &StoreKey, value: &serde_json::Value) -> Result<()> {
        match key {
            StoreKey::Contact(id) => {
                let snapshot: CounterpartSnapshot = serde_json::from_value(value.clone())?;
                self.apply_counterpart_snapshot(id, snapshot)
            }
            StoreKey::User(_) => {
                // Our own document; nothing mirrored to fold.
                Ok(())
            }
        }
    }

    // ── Pings ────────────────────────────────────────────────────────

    pub fn send_ping(&mut self, contact_id: &str, now: DateTime<Utc>) -> Result<Vec<NotificationIntent>> {
        let intent = ping::send_ping(&self.user, &mut self.registry, contact_id, now)?;
        self.sync_contact(contact_id, now);
        Ok(self.route_intents(vec![intent], now))
    }

    pub fn acknowledge_ping(
        &mut self,
        contact_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationIntent>> {
        let Some(intent) = ping::acknowledge_ping(&self.user, &mut self.registry, contact_id, now)?
        else {
            return Ok(Vec::new());
        };
        self.sync_contact(contact_id, now);
        Ok(self.route_intents(vec![intent], now))
    }

    pub fn clear_outgoing_ping(&mut self, contact_id: &str, now: DateTime<Utc>) -> Result<()> {
        ping::clear_outgoing_ping(&mut self.registry, contact_id)?;
        self.sync_contact(contact_id, now);
        Ok(())
    }

    /// Acknowledge every incoming-pending ping from responder contacts in
    /// one batch. Online, `persist` is the host's store write per contact;
    /// offline, acknowledgements apply locally and sync through the queue.
    pub fn respond_to_all<F>(&mut self, now: DateTime<Utc>, persist: F) -> RespondReport
    where
        F: FnMut(&Contact) -> std::result::Result<(), TransientIoError>,
    {
        if self.online {
            return ping::respond_to_all(&self.user, &mut self.registry, now, persist);
        }

        let mut report = ping::respond_to_all(&self.user, &mut self.registry, now, |_| Ok(()));
        for id in &report.acknowledged {
            self.sync_contact(id, now);
        }
        let intents = std::mem::take(&mut report.intents);
        self.route_intents(intents, now);
        report
    }

    // ── Offline queue ────────────────────────────────────────────────

    /// Queue an action explicitly, e.g. after an online store write failed.
    pub fn enqueue_offline(&mut self, action: OfflineAction, now: DateTime<Utc>) -> String {
        self.queue.enqueue(action, now)
    }

    /// Replay queued actions through the host's executor, in order,
    /// cancellable between items.
    pub fn replay_pending<F>(&mut self, now: DateTime<Utc>, executor: F) -> ReplayReport
    where
        F: FnMut(&OfflineAction) -> std::result::Result<(), TransientIoError>,
    {
        self.queue.replay(now, executor, &self.cancel)
    }

    /// Requeue a dead-lettered action after the host resolved its cause.
    pub fn requeue_dead_letter(&mut self, id: &str) -> Result<()> {
        self.queue.requeue_dead_letter(id)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Live intents pass through; offline they are queued for delivery on
    /// replay instead, so nothing is double-sent.
    fn route_intents(
        &mut self,
        intents: Vec<NotificationIntent>,
        now: DateTime<Utc>,
    ) -> Vec<NotificationIntent> {
        if self.online || intents.is_empty() {
            return intents;
        }
        for intent in intents {
            self.queue
                .enqueue(OfflineAction::SendNotification { intent }, now);
        }
        Vec::new()
    }

    fn sync_user(&mut self, now: DateTime<Utc>) {
        if !self.online {
            self.queue.enqueue(
                OfflineAction::UpdateUser {
                    user: self.user.clone(),
                },
                now,
            );
        }
    }

    fn sync_contact(&mut self, contact_id: &str, now: DateTime<Utc>) {
        if self.online {
            return;
        }
        if let Ok(contact) = self.registry.find(contact_id) {
            let contact = contact.clone();
            self.queue
                .enqueue(OfflineAction::UpdateContactStatus { contact }, now);
        }
    }
}
