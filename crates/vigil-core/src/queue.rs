//! Offline action queue.
//!
//! FIFO with at-least-once, ordering-preserving replay. Mutating operations
//! that cannot reach the durable store are appended here and replayed in
//! enqueue order once connectivity returns. A later action must never apply
//! before an earlier one that is still failing; the single exception is an
//! item exceeding its retry ceiling, which moves to the dead-letter set and
//! is surfaced to the caller rather than dropped silently.
//!
//! The pending queue and dead letters persist as a JSON file in the data
//! directory and survive process restart.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contact::Contact;
use crate::error::{ConfigurationError, EngineError, TransientIoError};
use crate::events::NotificationIntent;
use crate::storage::data_dir;
use crate::user::User;

/// A mutating operation deferred until connectivity returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OfflineAction {
    AddContact { contact: Contact },
    UpdateContactStatus { contact: Contact },
    RemoveContact { contact_id: String },
    UpdateUser { user: User },
    SendNotification { intent: NotificationIntent },
}

/// A queued action with its replay bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineActionItem {
    pub id: String,
    pub action: OfflineAction,
    pub enqueued_at: DateTime<Utc>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Cooperative cancellation for replay, checked between items, never
/// mid-item. Sign-out sets it so replay halts without leaving a
/// partially-applied action.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one replay pass.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// Items applied and removed, in order.
    pub applied: Vec<String>,
    /// Items that exceeded the retry ceiling and moved to the dead-letter
    /// set. The host must surface these to the user.
    pub dead_lettered: Vec<String>,
    /// The item whose failure stopped the pass, if any.
    pub halted_on: Option<(String, TransientIoError)>,
    /// The pass was cancelled between items.
    pub cancelled: bool,
}

impl ReplayReport {
    /// Everything pending was applied; nothing failed, died, or was cancelled.
    pub fn is_clean(&self) -> bool {
        self.halted_on.is_none() && self.dead_lettered.is_empty() && !self.cancelled
    }
}

/// FIFO queue of deferred actions.
pub struct OfflineQueue {
    items: VecDeque<OfflineActionItem>,
    dead_letters: Vec<OfflineActionItem>,
    /// Failures tolerated per item before it is dead-lettered.
    max_attempts: u32,
    /// Persistent queue file path.
    queue_file: PathBuf,
}

impl OfflineQueue {
    /// Create a queue persisting to the default data directory.
    pub fn new(max_attempts: u32) -> Result<Self, ConfigurationError> {
        let dir = data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_path(max_attempts, dir.join("offline_queue.json"))
    }

    /// Create a queue with a specific file path (for testing).
    pub fn with_path(max_attempts: u32, path: PathBuf) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::InvalidRetryCeiling(max_attempts));
        }
        Ok(Self {
            items: VecDeque::new(),
            dead_letters: Vec::new(),
            max_attempts,
            queue_file: path,
        })
    }

    /// Append an action. Returns its id immediately; never blocks on
    /// connectivity.
    pub fn enqueue(&mut self, action: OfflineAction, now: DateTime<Utc>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(item = %id, "action queued for replay");
        self.items.push_back(OfflineActionItem {
            id: id.clone(),
            action,
            enqueued_at: now,
            attempt_count: 0,
            last_attempt_at: None,
        });
        id
    }

    /// Replay pending items strictly in enqueue order.
    ///
    /// `executor` is the host's bridge to the durable store and notification
    /// transport. Success removes the item. Failure increments its attempt
    /// count and stops the pass, unless the count has exceeded the retry
    /// ceiling, in which case the item moves to the dead-letter set and the
    /// pass continues.
    pub fn replay<F>(
        &mut self,
        now: DateTime<Utc>,
        mut executor: F,
        cancel: &CancelFlag,
    ) -> ReplayReport
    where
        F: FnMut(&OfflineAction) -> Result<(), TransientIoError>,
    {
        let mut report = ReplayReport::default();

        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(item) = self.items.front_mut() else {
                break;
            };

            match executor(&item.action) {
                Ok(()) => {
                    report.applied.push(item.id.clone());
                    self.items.pop_front();
                }
                Err(err) => {
                    item.attempt_count += 1;
                    item.last_attempt_at = Some(now);

                    if item.attempt_count > self.max_attempts {
                        warn!(item = %item.id, attempts = item.attempt_count,
                            "retry ceiling exceeded, dead-lettering");
                        if let Some(dead) = self.items.pop_front() {
                            report.dead_lettered.push(dead.id.clone());
                            self.dead_letters.push(dead);
                        }
                        continue;
                    }

                    warn!(item = %item.id, attempts = item.attempt_count, error = %err,
                        "replay halted, will retry next pass");
                    report.halted_on = Some((item.id.clone(), err));
                    break;
                }
            }
        }

        report
    }

    /// Move a dead letter back to the end of the pending queue with its
    /// attempt count reset.
    pub fn requeue_dead_letter(&mut self, id: &str) -> Result<(), EngineError> {
        let idx = self
            .dead_letters
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| EngineError::NotFound { id: id.to_string() })?;
        let mut item = self.dead_letters.remove(idx);
        item.attempt_count = 0;
        item.last_attempt_at = None;
        self.items.push_back(item);
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &OfflineActionItem> {
        self.items.iter()
    }

    /// Items removed from active replay after exceeding the retry ceiling.
    pub fn dead_letters(&self) -> &[OfflineActionItem] {
        &self.dead_letters
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Persist pending items and dead letters to disk.
    pub fn persist(&self) -> Result<(), std::io::Error> {
        let snapshot = QueueSnapshot {
            pending: self.items.iter().cloned().collect(),
            dead_letters: self.dead_letters.clone(),
        };
        let data = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.queue_file, data)?;
        Ok(())
    }

    /// Load queue contents from disk, replacing the in-memory state.
    pub fn load(&mut self) -> Result<(), std::io::Error> {
        if !self.queue_file.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.queue_file)?;
        let snapshot: QueueSnapshot = serde_json::from_str(&content)?;
        self.items = snapshot.pending.into();
        self.dead_letters = snapshot.dead_letters;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct QueueSnapshot {
    pending: Vec<OfflineActionItem>,
    dead_letters: Vec<OfflineActionItem>,
}
