//! Error types for sync-core

use crate::target::{Channel, HolderToken, TargetRef};

/// Result type for sync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to operators when a target is busy
pub const LOCKED_MESSAGE: &str = "The target was locked by another process. Please try again later.";

/// Failure reported by a marketplace operation executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{channel} operation failed: {message}")]
pub struct ChannelError {
    /// Marketplace that rejected the operation
    pub channel: Channel,
    /// Detail for the operation log
    pub message: String,
    /// Whether a later attempt may succeed
    pub retryable: bool,
}

impl ChannelError {
    /// A failure worth retrying on the next scheduled pass
    pub fn retryable(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that will repeat until someone fixes the data
    pub fn permanent(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
            retryable: false,
        }
    }
}

/// Errors that can occur in sync-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Snapshots or schema describe different entity shapes
    #[error("Schema mismatch for {entity_type}: {reason}")]
    SchemaMismatch { entity_type: String, reason: String },

    /// Another holder owns a conflicting lock on the target
    #[error("Lock conflict on {target} (owner: {}): held by {holder}", owner.as_deref().unwrap_or("*"))]
    LockConflict {
        target: TargetRef,
        owner: Option<String>,
        holder: HolderToken,
    },

    /// A lock whose holder stopped sending heartbeats
    #[error("Stale lock on {target} held by {holder}: no heartbeat for {idle_secs}s")]
    StaleLock {
        target: TargetRef,
        owner: Option<String>,
        holder: HolderToken,
        idle_secs: i64,
    },

    /// The holder's locks were reclaimed while it was still running
    #[error("Locks held by {holder} were reclaimed")]
    LockLost { holder: HolderToken },

    /// Remote operation failed
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Configuration values are out of range or inconsistent
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Unknown policy kind or entity type
    #[error("Unknown policy: {name}")]
    UnknownPolicy { name: String },

    /// A target reference could not be parsed
    #[error("Invalid target: {value}")]
    InvalidTarget { value: String },

    // Transparent wrappers for underlying crate errors
    /// Store error from sync-store
    #[error(transparent)]
    Store(#[from] sync_store::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    /// Whether this is the expected "target busy" outcome
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Self::LockConflict { .. })
    }

    /// Text suitable for an operator or UI.
    ///
    /// Lock contention becomes a polite retry-later message; everything else
    /// uses the error's own display.
    pub fn user_message(&self) -> String {
        match self {
            Self::LockConflict { .. } => LOCKED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
