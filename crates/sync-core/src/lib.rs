//! Change propagation and processing-lock coordination for channel-sync
//!
//! This crate is the core between the commerce platform's catalog and the
//! marketplace channels (eBay, Amazon, Walmart):
//!
//! - **Diff engine** ([`diff`]): which attribute groups of a template changed
//! - **Instruction builders** ([`policy`]): per policy kind, diff + status to
//!   prioritized instructions
//! - **Instruction queue** ([`queue`]): durable, deduplicated, priority-ordered
//! - **Processing locks** ([`lock`]): scoped cooperative locks with heartbeats
//!   and a reaper for crashed holders
//! - **Processing runner** ([`runner`]): lock, execute, release, record
//!
//! # Architecture
//!
//! ```text
//!  mutation -> diff -> policy builders -> queue
//!                                           |
//!                       runner <------------+
//!                         |  locks (acquire / heartbeat / release)
//!                         v
//!                  ChannelExecutor (per marketplace)
//! ```
//!
//! All shared state lives in one [`SyncTables`] document behind a
//! [`sync_store::Store`], so every lock and queue operation is a single atomic
//! conditional write.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use sync_core::{
//!     AffectedTarget, Channel, InstructionQueue, PriorityTiers, Snapshot, SyncStatus, TargetRef,
//!     memory_store, propagate,
//! };
//!
//! let queue = InstructionQueue::new(memory_store());
//! let old = Snapshot::new("template_payment").with_group("payment", json!({"paypal": true}));
//! let new = Snapshot::new("template_payment").with_group("payment", json!({"paypal": false}));
//! let product = TargetRef::listing_product(Channel::Ebay, 7);
//!
//! propagate(&old, &new, &[AffectedTarget::new(product, SyncStatus::Listed)], &PriorityTiers::default(), &queue)?;
//!
//! let pending = queue.list_pending(&product)?;
//! assert_eq!(pending[0].instruction_type.as_str(), "PAYMENT_DATA_CHANGED");
//! assert_eq!(pending[0].priority.value(), 30);
//! # Ok::<(), sync_core::Error>(())
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod lock;
pub mod logging;
pub mod policy;
pub mod queue;
pub mod runner;
pub mod tables;
pub mod target;

pub use config::{ConfigResolver, SyncConfig};
pub use diff::{
    DiffResult, GroupChange, GroupKind, GroupSchema, LinkMode, Snapshot, TemplateLink, compute_diff,
};
pub use error::{ChannelError, Error, LOCKED_MESSAGE, Result};
pub use lock::{LockGuard, LockManager, LockRecord, LockSpec, ReapReport, Reaper, StaleLock};
pub use policy::{
    AffectedTarget, ChangeProcessor, InstructionData, PolicyKind, PriorityTiers, Propagation,
    SyncStatus, build_instructions, plan_propagation, propagate,
};
pub use queue::{
    EnqueueOutcome, Instruction, InstructionClaim, InstructionFilter, InstructionKey, InstructionQueue,
    InstructionType, Priority,
};
pub use runner::{
    ChannelExecutor, OperationParams, Outcome, ProcessingRunner, RunContext, RunLog, RunPhase,
    RunRecord, RunReport, RunRequest, RunStatus,
};
pub use tables::{SharedStore, SyncTables, file_store, memory_store};
pub use target::{Channel, HolderToken, TargetKind, TargetRef};
