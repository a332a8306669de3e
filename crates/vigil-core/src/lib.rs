//! # Vigil Core Library
//!
//! Core check-in and alert engine for the Vigil personal-safety network:
//! each user periodically checks in, and failure to do so within a
//! configured interval raises visibility to their responders. The engine is
//! a library; hosts bring identity, storage, and push delivery.
//!
//! ## Architecture
//!
//! - **Check-In Scheduler**: wall-clock deadline arithmetic on the current
//!   user, evaluated on demand by the caller -- no internal timers
//! - **Responsiveness Evaluator & Alert Machine**: edge-triggered
//!   non-responsive transitions per contact, plus the independent manual
//!   emergency alert
//! - **Ping Coordinator**: the request/acknowledge status-check protocol
//!   between contacts
//! - **Contact Registry**: the in-memory source of truth for relationship
//!   state within a session
//! - **Offline Queue**: ordered, at-least-once replay of mutations made
//!   while disconnected
//! - **Storage**: TOML preferences and a JSON state cache that survive
//!   process restart
//!
//! The engine performs no network I/O. Operations return
//! [`NotificationIntent`] values and queue commands; the host executes them
//! against its durable store and push transport and feeds results back.
//!
//! ## Key Components
//!
//! - [`Engine`]: per-session facade over all of the above
//! - [`ContactRegistry`]: relationship index, queryable by role
//! - [`OfflineQueue`]: deferred-action queue with dead-letter reporting
//! - [`DurableStore`] / [`IdentityProvider`]: contracts the host implements

pub mod alert;
pub mod checkin;
pub mod contact;
pub mod error;
pub mod events;
pub mod ping;
pub mod queue;
pub mod registry;
pub mod session;
pub mod storage;
pub mod store;
pub mod user;

pub use checkin::{CheckInRecord, CLOCK_SKEW_TOLERANCE_SECS};
pub use contact::{Contact, CounterpartSnapshot, PingState, Role, RoleSet};
pub use error::{
    ConfigurationError, ConflictError, EngineError, StoreError, TransientIoError, ValidationError,
};
pub use events::{NotificationIntent, NotificationKind};
pub use ping::RespondReport;
pub use queue::{CancelFlag, OfflineAction, OfflineActionItem, OfflineQueue, ReplayReport};
pub use registry::ContactRegistry;
pub use session::{Engine, SessionContext};
pub use storage::{data_dir, CachedState, Preferences};
pub use store::{DurableStore, IdentityProvider, MemoryStore, StaticIdentity, StoreKey};
pub use user::{AlertFlag, NotificationPrefs, User};
