//! Run records and the per-target operation log

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_store::{update, view};

use crate::Result;
use crate::tables::SharedStore;
use crate::target::{HolderToken, TargetRef};

/// Lifecycle phase of a single run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunPhase {
    Created,
    LocksAcquiring,
    LocksHeld,
    Executing,
    Succeeded,
    Failed,
    LocksReleased,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::LocksAcquiring => "locks_acquiring",
            Self::LocksHeld => "locks_held",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::LocksReleased => "locks_released",
        };
        f.write_str(name)
    }
}

/// Persisted status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the operation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub holder: HolderToken,
    pub target: TargetRef,
    pub operation: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Read and write access to run records
#[derive(Clone)]
pub struct RunLog {
    store: SharedStore,
}

impl RunLog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Record a new pending run
    pub(crate) fn open(&self, holder: HolderToken, target: TargetRef, operation: &str) -> Result<()> {
        let now = Utc::now();
        let record = RunRecord {
            holder,
            target,
            operation: operation.to_string(),
            status: RunStatus::Pending,
            started_at: now,
            finished_at: None,
            last_heartbeat: now,
            error: None,
        };
        update(&*self.store, |tables| -> Result<()> {
            tables.runs.push(record);
            Ok(())
        })
    }

    /// Move a run to `status`; terminal statuses stamp `finished_at`
    pub(crate) fn set_status(
        &self,
        holder: &HolderToken,
        status: RunStatus,
        error: Option<String>,
    ) -> Result<()> {
        let now = Utc::now();
        update(&*self.store, |tables| -> Result<()> {
            if let Some(run) = tables.runs.iter_mut().find(|r| r.holder == *holder) {
                run.status = status;
                run.last_heartbeat = now;
                if status.is_terminal() {
                    run.finished_at = Some(now);
                }
                if error.is_some() {
                    run.error = error;
                }
            }
            Ok(())
        })
    }

    /// Refresh a run's heartbeat; returns whether the run is still live
    pub(crate) fn touch(&self, holder: &HolderToken, now: DateTime<Utc>) -> Result<bool> {
        update(&*self.store, |tables| -> Result<bool> {
            match tables
                .runs
                .iter_mut()
                .find(|r| r.holder == *holder && !r.status.is_terminal())
            {
                Some(run) => {
                    run.last_heartbeat = now;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    /// The run created with `holder`
    pub fn get(&self, holder: &HolderToken) -> Result<Option<RunRecord>> {
        Ok(view(&*self.store, |tables| {
            tables.runs.iter().find(|r| r.holder == *holder).cloned()
        })?)
    }

    /// Runs against `target`, newest first (ties in insertion order, reversed)
    pub fn history(&self, target: &TargetRef) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = view(&*self.store, |tables| {
            tables
                .runs
                .iter()
                .rev()
                .filter(|r| r.target == *target)
                .cloned()
                .collect()
        })?;
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Every run, newest first
    pub fn all(&self) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> =
            view(&*self.store, |tables| tables.runs.iter().rev().cloned().collect())?;
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    /// Drop terminal runs that finished before `cutoff`; returns rows removed
    pub fn prune_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        update(&*self.store, |tables| -> Result<usize> {
            Ok(prune_finished(&mut tables.runs, cutoff))
        })
    }
}

/// Remove terminal runs that finished before `cutoff` from `runs`
pub(crate) fn prune_finished(runs: &mut Vec<RunRecord>, cutoff: DateTime<Utc>) -> usize {
    let before = runs.len();
    runs.retain(|r| !(r.status.is_terminal() && r.finished_at.is_some_and(|at| at < cutoff)));
    before - runs.len()
}
