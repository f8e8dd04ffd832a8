//! Processing runner: one lock-protected synchronization attempt
//!
//! A run moves through [`RunPhase`]s in order:
//!
//! ```text
//! Created -> LocksAcquiring -> LocksHeld -> Executing -> Succeeded | Failed -> LocksReleased
//! ```
//!
//! Lock conflicts fail the run before anything executes. Channel errors fail
//! the run and leave the motivating instructions queued for a later pass.
//! Locks are held by a [`LockGuard`](crate::lock::LockGuard) and released on
//! every path, including early returns.

mod executor;
pub mod plan;
mod record;

pub use executor::{ChannelExecutor, OperationParams, Outcome, RunContext};
pub use record::{RunLog, RunPhase, RunRecord, RunStatus};
pub(crate) use record::prune_finished;

use std::collections::HashMap;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::lock::{LockManager, LockSpec};
use crate::config::SyncConfig;
use crate::queue::{Instruction, InstructionClaim, InstructionFilter, InstructionQueue};
use crate::tables::SharedStore;
use crate::target::{Channel, HolderToken, TargetRef};
use crate::{Error, Result};

/// Default heartbeat interval when none is configured
pub const DEFAULT_HEARTBEAT_SECS: i64 = 60;

/// Default number of instructions one [`ProcessingRunner::drain_pending`] pass reads
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Everything the runner needs to perform one operation
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub params: OperationParams,
    pub locks: Vec<LockSpec>,
    /// Instructions completed if the run succeeds, at the revision the run saw
    pub instructions: Vec<InstructionClaim>,
}

impl RunRequest {
    /// A request using the operation's default lock plan
    pub fn new(params: OperationParams) -> Self {
        let locks = plan::operation_locks(params.target, &params.operation);
        Self {
            params,
            locks,
            instructions: Vec::new(),
        }
    }

    /// Replace the lock plan
    pub fn with_locks(mut self, locks: Vec<LockSpec>) -> Self {
        self.locks = locks;
        self
    }

    /// Attach instructions this run satisfies
    pub fn with_instructions(mut self, claims: impl IntoIterator<Item = InstructionClaim>) -> Self {
        for claim in claims {
            if !self.instructions.iter().any(|c| c.key == claim.key) {
                self.instructions.push(claim);
            }
        }
        self
    }
}

/// Result of one run
#[derive(Debug)]
pub struct RunReport {
    pub holder: HolderToken,
    pub target: TargetRef,
    pub operation: String,
    pub status: RunStatus,
    pub outcome: Option<Outcome>,
    pub failure: Option<Error>,
    /// Instructions removed from the queue
    pub completed: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    fn failed(holder: HolderToken, request: &RunRequest, failure: Error) -> Self {
        Self {
            holder,
            target: request.params.target,
            operation: request.params.operation.clone(),
            status: RunStatus::Failed,
            outcome: None,
            failure: Some(failure),
            completed: 0,
        }
    }
}

/// Orchestrates runs against registered channel executors
pub struct ProcessingRunner {
    locks: LockManager,
    queue: InstructionQueue,
    log: RunLog,
    executors: HashMap<Channel, Box<dyn ChannelExecutor>>,
    heartbeat_interval: Duration,
    batch_size: usize,
}

impl ProcessingRunner {
    pub fn new(store: SharedStore) -> Self {
        Self {
            locks: LockManager::new(store.clone()),
            queue: InstructionQueue::new(store.clone()),
            log: RunLog::new(store),
            executors: HashMap::new(),
            heartbeat_interval: Duration::seconds(DEFAULT_HEARTBEAT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// A runner using the configured heartbeat interval and batch size
    pub fn from_config(store: SharedStore, config: &SyncConfig) -> Self {
        Self::new(store)
            .with_heartbeat_interval(config.heartbeat_interval())
            .with_batch_size(config.queue.batch_size)
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Interval handed to every [`RunContext`]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Register the executor for its channel, replacing any previous one
    pub fn with_executor(mut self, executor: impl ChannelExecutor + 'static) -> Self {
        self.executors.insert(executor.channel(), Box::new(executor));
        self
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn queue(&self) -> &InstructionQueue {
        &self.queue
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Perform one run.
    ///
    /// Expected failures (lock conflict, channel error) come back as a
    /// [`RunReport`] with status [`RunStatus::Failed`]. `Err` is reserved for
    /// the store itself failing.
    pub fn run(&self, request: RunRequest) -> Result<RunReport> {
        let holder = HolderToken::generate();
        let target = request.params.target;
        let operation = request.params.operation.as_str();

        self.log.open(holder, target, operation)?;
        debug!(%holder, %target, operation, phase = %RunPhase::Created, "run phase");

        debug!(%holder, locks = request.locks.len(), phase = %RunPhase::LocksAcquiring, "run phase");
        let guard = match self.locks.acquire_all(&request.locks, &holder) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(%holder, %target, operation, error = %e, "run failed before execution");
                self.log
                    .set_status(&holder, RunStatus::Failed, Some(e.user_message()))?;
                debug!(%holder, phase = %RunPhase::LocksReleased, "run phase");
                return Ok(RunReport::failed(holder, &request, e));
            }
        };

        self.log.set_status(&holder, RunStatus::Running, None)?;
        debug!(%holder, phase = %RunPhase::LocksHeld, "run phase");

        debug!(%holder, phase = %RunPhase::Executing, "run phase");
        let ctx = RunContext::new(
            holder,
            target,
            &self.locks,
            &self.log,
            guard.specs().len(),
            self.heartbeat_interval,
        );
        let result = match self.executors.get(&target.channel) {
            Some(executor) => executor.execute(&ctx, &request.params),
            None => Err(ChannelError::permanent(
                target.channel,
                format!("no executor registered for {}", target.channel),
            )),
        };

        let report = match result {
            // A slow run may have been reaped; only a run that still holds its
            // locks may complete instructions
            Ok(_) if self.locks.heartbeat(&holder)? < guard.specs().len() => {
                let lost = Error::LockLost { holder };
                warn!(%holder, %target, operation, error = %lost, "run finished without its locks; instructions retained");
                self.log
                    .set_status(&holder, RunStatus::Failed, Some(lost.to_string()))?;
                debug!(%holder, phase = %RunPhase::Failed, "run phase");

                RunReport::failed(holder, &request, lost)
            }
            Ok(outcome) => {
                let completed = self.queue.complete(&request.instructions)?;
                self.log.set_status(&holder, RunStatus::Succeeded, None)?;
                info!(%holder, %target, operation, completed, summary = %outcome.summary, "run succeeded");
                debug!(%holder, phase = %RunPhase::Succeeded, "run phase");

                RunReport {
                    holder,
                    target,
                    operation: operation.to_string(),
                    status: RunStatus::Succeeded,
                    outcome: Some(outcome),
                    failure: None,
                    completed,
                }
            }
            Err(e) => {
                warn!(
                    %holder,
                    %target,
                    operation,
                    retryable = e.retryable,
                    error = %e,
                    "run failed; instructions retained"
                );
                self.log
                    .set_status(&holder, RunStatus::Failed, Some(e.to_string()))?;
                debug!(%holder, phase = %RunPhase::Failed, "run phase");

                RunReport::failed(holder, &request, Error::Channel(e))
            }
        };

        let released = guard.release()?;
        debug!(%holder, released, phase = %RunPhase::LocksReleased, "run phase");
        Ok(report)
    }

    /// Dequeue up to `limit` instructions and run them grouped by target.
    ///
    /// Groups are visited in the order their highest-priority instruction
    /// was dequeued. `planner` turns a group into a request or skips it with
    /// `None`; the group's instruction claims are attached automatically.
    pub fn drain<P>(&self, limit: usize, filter: &InstructionFilter, planner: P) -> Result<Vec<RunReport>>
    where
        P: Fn(&TargetRef, &[Instruction]) -> Option<RunRequest>,
    {
        let batch = self.queue.dequeue_batch(limit, filter)?;

        let mut groups: Vec<(TargetRef, Vec<Instruction>)> = Vec::new();
        for instruction in batch {
            match groups.iter_mut().find(|(t, _)| *t == instruction.target) {
                Some((_, members)) => members.push(instruction),
                None => groups.push((instruction.target, vec![instruction])),
            }
        }

        let mut reports = Vec::with_capacity(groups.len());
        for (target, instructions) in groups {
            let Some(request) = planner(&target, &instructions) else {
                debug!(%target, pending = instructions.len(), "planner skipped target");
                continue;
            };
            let request = request.with_instructions(instructions.iter().map(Instruction::claim));
            reports.push(self.run(request)?);
        }

        let failed = reports.iter().filter(|r| !r.is_success()).count();
        info!(runs = reports.len(), failed, "drain complete");
        Ok(reports)
    }

    /// [`ProcessingRunner::drain`] one batch of the configured size
    pub fn drain_pending<P>(&self, filter: &InstructionFilter, planner: P) -> Result<Vec<RunReport>>
    where
        P: Fn(&TargetRef, &[Instruction]) -> Option<RunRequest>,
    {
        self.drain(self.batch_size, filter, planner)
    }
}
