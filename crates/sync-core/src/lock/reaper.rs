//! Reclaims locks orphaned by crashed runners

use chrono::{DateTime, Duration, Utc};
use sync_store::{update, view};
use tracing::{info, warn};

use super::LockRecord;
use crate::config::SyncConfig;
use crate::runner::{RunStatus, prune_finished};
use crate::tables::{SharedStore, SyncTables};
use crate::target::HolderToken;
use crate::{Error, Result};

/// A lock whose holder has not sent a heartbeat within the threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleLock {
    pub lock: LockRecord,
    pub idle: Duration,
}

impl StaleLock {
    /// The warning logged when this lock is reclaimed
    pub fn to_error(&self) -> Error {
        Error::StaleLock {
            target: self.lock.target,
            owner: self.lock.owner.clone(),
            holder: self.lock.holder,
            idle_secs: self.idle.num_seconds(),
        }
    }
}

/// What a sweep reclaimed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Locks that were force-released
    pub released: Vec<StaleLock>,
    /// Holders whose unfinished runs were marked failed
    pub failed_runs: Vec<HolderToken>,
    /// Finished runs dropped from the operation log
    pub pruned_runs: usize,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.failed_runs.is_empty() && self.pruned_runs == 0
    }
}

/// Periodic job that force-releases locks with stale heartbeats.
///
/// This is the only expiry mechanism: acquisition never treats an old lock as
/// free, so a slow but live runner keeps its locks as long as it heartbeats
/// more often than `stale_after`.
///
/// With a run retention set, each sweep also drops finished runs older than
/// the retention window so the operation log stays bounded.
#[derive(Clone)]
pub struct Reaper {
    store: SharedStore,
    stale_after: Duration,
    retain_runs: Option<Duration>,
}

impl Reaper {
    pub fn new(store: SharedStore, stale_after: Duration) -> Self {
        Self {
            store,
            stale_after,
            retain_runs: None,
        }
    }

    /// Reaper with the staleness threshold and run retention from `config`
    pub fn from_config(store: SharedStore, config: &SyncConfig) -> Self {
        Self::new(store, config.stale_after()).with_run_retention(config.run_retention())
    }

    /// Prune finished runs older than `retain` on every sweep
    pub fn with_run_retention(mut self, retain: Duration) -> Self {
        self.retain_runs = Some(retain);
        self
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn run_retention(&self) -> Option<Duration> {
        self.retain_runs
    }

    /// Stale locks as of now, without releasing anything
    pub fn find_stale(&self) -> Result<Vec<StaleLock>> {
        self.find_stale_at(Utc::now())
    }

    /// Stale locks as of `now`, without releasing anything
    pub fn find_stale_at(&self, now: DateTime<Utc>) -> Result<Vec<StaleLock>> {
        let stale_after = self.stale_after;
        Ok(view(&*self.store, |tables| stale_locks(tables, now, stale_after))?)
    }

    /// Release every stale lock, fail the runs that owned them, and prune
    /// finished runs past the retention window
    pub fn sweep(&self) -> Result<ReapReport> {
        self.sweep_at(Utc::now())
    }

    /// [`Reaper::sweep`] with an explicit clock
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<ReapReport> {
        let stale_after = self.stale_after;
        let retain_runs = self.retain_runs;
        let report = update(&*self.store, |tables| -> Result<ReapReport> {
            let released = stale_locks(tables, now, stale_after);
            tables
                .locks
                .retain(|l| !released.iter().any(|s| s.lock == *l));

            let mut failed_runs = Vec::new();
            for run in tables.runs.iter_mut() {
                if run.status.is_terminal() || now - run.last_heartbeat <= stale_after {
                    continue;
                }
                run.status = RunStatus::Failed;
                run.finished_at = Some(now);
                run.error = Some(format!(
                    "no heartbeat for {}s; reclaimed by reaper",
                    (now - run.last_heartbeat).num_seconds()
                ));
                failed_runs.push(run.holder);
            }

            let pruned_runs = retain_runs
                .map(|retain| prune_finished(&mut tables.runs, now - retain))
                .unwrap_or(0);

            Ok(ReapReport {
                released,
                failed_runs,
                pruned_runs,
            })
        })?;

        for stale in &report.released {
            warn!(error = %stale.to_error(), "force-released stale lock");
        }
        for holder in &report.failed_runs {
            warn!(%holder, "marked abandoned run as failed");
        }
        if !report.is_empty() {
            info!(
                locks = report.released.len(),
                runs = report.failed_runs.len(),
                pruned = report.pruned_runs,
                "reaper sweep complete"
            );
        }

        Ok(report)
    }
}

fn stale_locks(tables: &SyncTables, now: DateTime<Utc>, stale_after: Duration) -> Vec<StaleLock> {
    tables
        .locks
        .iter()
        .filter_map(|lock| {
            let idle = now - lock.last_heartbeat;
            (idle > stale_after).then(|| StaleLock {
                lock: lock.clone(),
                idle,
            })
        })
        .collect()
}
