//! The seam between the runner and marketplace-specific code

use std::cell::Cell;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::RunLog;
use crate::error::ChannelError;
use crate::lock::LockManager;
use crate::target::{Channel, HolderToken, TargetRef};
use crate::{Error, Result};

/// What a run asks a channel to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationParams {
    /// Operation name, e.g. `revise` or `add_account`
    pub operation: String,
    pub target: TargetRef,
    /// Channel-specific request body; opaque to the core
    #[serde(default)]
    pub payload: Value,
}

impl OperationParams {
    pub fn new(operation: impl Into<String>, target: TargetRef) -> Self {
        Self {
            operation: operation.into(),
            target,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// What a channel reports back after a successful operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub summary: String,
    #[serde(default)]
    pub data: Value,
}

impl Outcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            data: Value::Null,
        }
    }
}

/// Performs operations against one marketplace.
///
/// Implementations own every wire detail. They should call
/// [`RunContext::heartbeat_if_due`] between long steps so their locks are not
/// reclaimed as stale.
pub trait ChannelExecutor: Send + Sync {
    fn channel(&self) -> Channel;

    fn execute(&self, ctx: &RunContext<'_>, params: &OperationParams) -> std::result::Result<Outcome, ChannelError>;
}

/// Handle an executor uses to prove the run is still alive
pub struct RunContext<'a> {
    holder: HolderToken,
    target: TargetRef,
    locks: &'a LockManager,
    log: &'a RunLog,
    expected_locks: usize,
    heartbeat_interval: Duration,
    last_beat: Cell<DateTime<Utc>>,
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(
        holder: HolderToken,
        target: TargetRef,
        locks: &'a LockManager,
        log: &'a RunLog,
        expected_locks: usize,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            holder,
            target,
            locks,
            log,
            expected_locks,
            heartbeat_interval,
            last_beat: Cell::new(Utc::now()),
        }
    }

    pub fn holder(&self) -> &HolderToken {
        &self.holder
    }

    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    /// Refresh every lock of this run and its run record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockLost`] if any lock has been reclaimed meanwhile;
    /// the executor should stop and report failure.
    pub fn heartbeat(&self) -> Result<()> {
        let now = Utc::now();
        let refreshed = self.locks.heartbeat_at(&self.holder, now)?;
        self.log.touch(&self.holder, now)?;
        self.last_beat.set(now);

        debug!(holder = %self.holder, refreshed, "heartbeat");
        if refreshed < self.expected_locks {
            return Err(Error::LockLost {
                holder: self.holder,
            });
        }
        Ok(())
    }

    /// Heartbeat only if the configured interval has elapsed.
    ///
    /// Returns whether a heartbeat was sent.
    pub fn heartbeat_if_due(&self) -> Result<bool> {
        if Utc::now() - self.last_beat.get() < self.heartbeat_interval {
            return Ok(false);
        }
        self.heartbeat().map(|()| true)
    }
}
