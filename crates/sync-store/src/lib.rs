//! Transactional document store for channel-sync
//!
//! Lock rows, queued instructions and run records must survive process
//! restarts and be written with atomic conditional semantics, because the
//! runners that share them are independent processes. This crate provides
//! that substrate as a small [`Store`] trait with two backends:
//!
//! - [`MemoryStore`]: mutex-guarded, for tests and single-process use
//! - [`FileStore`]: one document on disk, serialized across processes with an
//!   `fs2` advisory lock and written atomically (temp file + rename)
//!
//! # Example
//!
//! ```
//! use sync_store::{MemoryStore, update, view};
//!
//! let store = MemoryStore::new(Vec::<String>::new());
//! let pushed: sync_store::Result<usize> = update(&store, |rows| {
//!     rows.push("row".to_string());
//!     Ok(rows.len())
//! });
//! assert_eq!(pushed.unwrap(), 1);
//! assert_eq!(view(&store, |rows| rows.len()).unwrap(), 1);
//! ```

pub mod error;
pub mod file;
pub mod format;
pub mod memory;
pub mod store;

pub use error::{Error, Result};
pub use file::FileStore;
pub use format::Format;
pub use memory::MemoryStore;
pub use store::{Commit, Store, update, view};
