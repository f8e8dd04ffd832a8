//! Error types for sync-store

use std::path::PathBuf;

/// Result type for sync-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sync-store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} document at {path}: {message}")]
    Parse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Failed to serialize {format} document for {path}: {message}")]
    Serialize {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported document format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    /// A previous holder of the in-memory store panicked mid-transaction
    #[error("Store mutex poisoned")]
    Poisoned,

    /// The transaction body was never run
    #[error("Transaction aborted before the operation ran")]
    Aborted,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
