//! Ping / acknowledge protocol coordination.
//!
//! A two-state protocol per relationship direction: `Absent ->
//! Pending(sent_at) -> Absent`. One side's outgoing is the other side's
//! incoming; both directions are written here and nowhere else.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::contact::{Contact, PingState};
use crate::error::{ConflictError, EngineError, TransientIoError};
use crate::events::NotificationIntent;
use crate::registry::ContactRegistry;
use crate::user::User;

/// Outcome of [`respond_to_all`].
///
/// Successes are not rolled back on partial failure; contacts whose store
/// write failed stay pending and are reported individually.
#[derive(Debug, Default)]
pub struct RespondReport {
    /// Contact ids whose incoming ping was acknowledged and persisted.
    pub acknowledged: Vec<String>,
    /// Contacts whose persist failed, with the failure. Their pings remain
    /// pending.
    pub failed: Vec<(String, TransientIoError)>,
    /// `ping-cleared` intents for the acknowledged contacts.
    pub intents: Vec<NotificationIntent>,
}

impl RespondReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ask a contact to confirm their status.
///
/// Fails with `AlreadyPending` while a ping in this direction is
/// outstanding; duplicate requests would only spam the counterpart.
pub fn send_ping(
    user: &User,
    registry: &mut ContactRegistry,
    contact_id: &str,
    now: DateTime<Utc>,
) -> Result<NotificationIntent, EngineError> {
    let contact = registry.find_mut(contact_id)?;
    if contact.outgoing_ping.is_pending() {
        return Err(ConflictError::AlreadyPending {
            contact_id: contact_id.to_string(),
        }
        .into());
    }

    contact.outgoing_ping = PingState::Pending { sent_at: now };
    debug!(contact = %contact.id, "ping sent");
    Ok(NotificationIntent::ping(
        &user.display_name,
        &contact.counterpart_id,
        now,
    ))
}

/// Acknowledge a ping the counterpart sent us.
///
/// Clears the incoming-pending flag as observed locally. A no-op when
/// nothing is pending; an actual acknowledgement produces a `ping-cleared`
/// intent so the counterpart's outgoing side resets.
pub fn acknowledge_ping(
    user: &User,
    registry: &mut ContactRegistry,
    contact_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<NotificationIntent>, EngineError> {
    let contact = registry.find_mut(contact_id)?;
    if !contact.incoming_ping.is_pending() {
        return Ok(None);
    }

    contact.incoming_ping = PingState::Absent;
    debug!(contact = %contact.id, "incoming ping acknowledged");
    Ok(Some(NotificationIntent::ping_cleared(
        &user.display_name,
        &contact.counterpart_id,
        now,
    )))
}

/// Cancel a self-initiated ping without waiting for acknowledgement.
pub fn clear_outgoing_ping(
    registry: &mut ContactRegistry,
    contact_id: &str,
) -> Result<(), EngineError> {
    let contact = registry.find_mut(contact_id)?;
    contact.outgoing_ping = PingState::Absent;
    Ok(())
}

/// Acknowledge every incoming-pending ping from responder-role contacts.
///
/// `persist` is the host's store write for one contact. Each contact is
/// acknowledged locally, persisted, and on failure restored to pending --
/// the batch never reports silent partial success.
pub fn respond_to_all<F>(
    user: &User,
    registry: &mut ContactRegistry,
    now: DateTime<Utc>,
    mut persist: F,
) -> RespondReport
where
    F: FnMut(&Contact) -> Result<(), TransientIoError>,
{
    let pending_ids: Vec<String> = registry
        .responders()
        .iter()
        .filter(|c| c.incoming_ping.is_pending())
        .map(|c| c.id.clone())
        .collect();

    let mut report = RespondReport::default();
    for id in pending_ids {
        let Ok(contact) = registry.find_mut(&id) else {
            continue;
        };
        let previous = contact.incoming_ping;
        contact.incoming_ping = PingState::Absent;

        match persist(contact) {
            Ok(()) => {
                report
                    .intents
                    .push(NotificationIntent::ping_cleared(
                        &user.display_name,
                        &contact.counterpart_id,
                        now,
                    ));
                report.acknowledged.push(id);
            }
            Err(err) => {
                warn!(contact = %id, error = %err, "acknowledge persist failed, ping stays pending");
                contact.incoming_ping = previous;
                report.failed.push((id, err));
            }
        }
    }
    report
}
