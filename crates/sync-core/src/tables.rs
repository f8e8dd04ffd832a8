//! The persisted document shared by every worker
//!
//! Locks, queued instructions and run records live in one [`SyncTables`]
//! document so that a single store transaction can check and write any of
//! them atomically.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sync_store::{FileStore, MemoryStore, Store};

use crate::lock::LockRecord;
use crate::queue::Instruction;
use crate::runner::RunRecord;

/// A queued instruction plus its insertion sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRow {
    /// Monotonic insertion order; final tiebreaker when dequeuing
    pub seq: u64,
    pub instruction: Instruction,
}

/// Every shared row of the synchronization core
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncTables {
    /// Next value handed out as [`InstructionRow::seq`]
    #[serde(default)]
    pub next_seq: u64,
    #[serde(default)]
    pub locks: Vec<LockRecord>,
    #[serde(default)]
    pub instructions: Vec<InstructionRow>,
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

/// Shared handle to whichever backend holds the tables
pub type SharedStore = Arc<dyn Store<Doc = SyncTables>>;

/// A fresh in-memory store
pub fn memory_store() -> SharedStore {
    Arc::new(MemoryStore::new(SyncTables::default()))
}

/// A file-backed store at `path` (format chosen by extension)
pub fn file_store(path: impl Into<std::path::PathBuf>) -> crate::Result<SharedStore> {
    Ok(Arc::new(FileStore::<SyncTables>::open(path)?))
}
