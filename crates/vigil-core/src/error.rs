//! Core error types for vigil-core.
//!
//! Every engine operation returns a typed `Result`; nothing in this crate
//! aborts the host process. Validation failures are rejected synchronously
//! and never retried, transient store/transport failures are retried by the
//! offline queue's replay policy, and configuration errors are fatal at
//! construction time only.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Top-level error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Input rejected synchronously; never retried.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Conflicting operation, surfaced to the caller rather than auto-resolved.
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Referenced entity does not exist.
    #[error("Not found: {id}")]
    NotFound { id: String },

    /// Store or transport failure; retried per the replay policy.
    #[error("Transient IO error: {0}")]
    TransientIo(#[from] TransientIoError),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// No authenticated user, or the session identity does not match.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Check-in intervals must be strictly positive.
    #[error("Invalid check-in interval: {seconds}s (must be positive)")]
    InvalidInterval { seconds: i64 },

    /// Check-in timestamps must not move backwards beyond the clock-skew
    /// tolerance.
    #[error("Invalid check-in timestamp: {now} predates last check-in {last_check_in}")]
    InvalidTimestamp {
        now: DateTime<Utc>,
        last_check_in: DateTime<Utc>,
    },

    /// A contact must hold at least one role.
    #[error("Contact role set must not be empty")]
    EmptyRoleSet,
}

/// Conflicts surfaced to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// An add was attempted for a relationship id that already exists with a
    /// different counterpart identity.
    #[error("Contact {contact_id} already exists with a different counterpart")]
    DuplicateContact { contact_id: String },

    /// A ping in this direction is already outstanding.
    #[error("A ping to contact {contact_id} is already pending")]
    AlreadyPending { contact_id: String },
}

/// Transient failures reaching the durable store or notification transport.
///
/// These are the only errors the replay policy retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransientIoError {
    #[error("Durable store error: {0}")]
    Store(String),

    #[error("Notification transport error: {0}")]
    Transport(String),
}

/// Configuration errors, fatal at construction time only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The replay retry ceiling must allow at least one attempt.
    #[error("Replay retry ceiling must be at least 1 (got {0})")]
    InvalidRetryCeiling(u32),
}

/// Errors produced by a [`DurableStore`](crate::store::DurableStore)
/// implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend cannot be reached right now.
    #[error("Store backend unavailable: {0}")]
    Unavailable(String),

    /// A stored document could not be encoded or decoded.
    #[error("Store document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl From<StoreError> for TransientIoError {
    fn from(err: StoreError) -> Self {
        TransientIoError::Store(err.to_string())
    }
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
