//! Error types for tabspace.
//!
//! [`TabspaceError`] is the top-level error type shared by the platform and
//! core crates. It is non-exhaustive to allow future extension without
//! breaking downstream.

use thiserror::Error;

use crate::session::SessionId;

/// Top-level error type for the tabspace crates.
///
/// Engine-internal errors are non-fatal by contract: a failed
/// reconciliation pass for one window must never prevent future passes for
/// any window. Store failures are propagated to the caller of the mutating
/// operation; consistency of the in-memory cache with the store after such
/// a failure is out of guarantee.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TabspaceError {
    /// The durable store rejected or failed an operation.
    #[error("store error: {reason}")]
    Store {
        /// What the store reported.
        reason: String,
    },

    /// A mutation referenced a session id the cache does not hold.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A persistence mutation was requested for a session with no id.
    #[error("session is not saved")]
    SessionUnsaved,

    /// Querying live window/tab state failed in a non-transient way.
    ///
    /// A plain lookup miss (window gone) is *not* an error -- the engine
    /// treats it as an implicit removal signal.
    #[error("browser query failed: {reason}")]
    Browser {
        /// What the browser backend reported.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience alias used throughout the tabspace crates.
pub type Result<T> = std::result::Result<T, TabspaceError>;
