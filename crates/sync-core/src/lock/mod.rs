//! Processing locks: cooperative mutual exclusion on channel targets
//!
//! Lock rows live in the shared store, so every acquisition is a conditional
//! write checked inside one store transaction. An in-memory mutex would not
//! do: the runners contending for a target are independent processes.
//!
//! # Conflict rules
//!
//! A lock is identified by `(owner, target)`. The owner names the kind of
//! work (`server_synchronize`, `adding_to_server`, ...) or is `None` for the
//! coarse "whole target is busy" lock:
//!
//! - the same holder token may re-acquire any lock it already holds
//! - a named owner conflicts with the same owner held by someone else
//! - a `None` owner conflicts with every lock on the target, and every
//!   named owner conflicts with a `None` lock held by someone else
//!
//! Locks never expire on their own. Long-running holders refresh
//! `last_heartbeat`; the [`Reaper`] reclaims rows whose heartbeat is stale.

mod guard;
mod reaper;

pub use guard::LockGuard;
pub use reaper::{ReapReport, Reaper, StaleLock};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sync_store::{update, view};
use tracing::{debug, warn};

use crate::tables::SharedStore;
use crate::target::{HolderToken, TargetRef};
use crate::{Error, Result};

/// A persisted lock row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Kind of work the lock guards; `None` locks the whole target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub target: TargetRef,
    pub holder: HolderToken,
    pub acquired_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl LockRecord {
    /// Whether this row blocks `holder` from taking `(owner, target)`
    fn conflicts_with(&self, owner: Option<&str>, target: &TargetRef, holder: &HolderToken) -> bool {
        self.target == *target
            && self.holder != *holder
            && (owner.is_none() || self.owner.is_none() || self.owner.as_deref() == owner)
    }

    fn is(&self, owner: Option<&str>, target: &TargetRef, holder: &HolderToken) -> bool {
        self.owner.as_deref() == owner && self.target == *target && self.holder == *holder
    }
}

/// A lock an operation needs before it may run.
///
/// Ordering is by target, then owner with `None` first, then
/// lexicographically; multi-lock acquisition always follows this order so two
/// runners never take the same pair of locks in opposite order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockSpec {
    pub target: TargetRef,
    pub owner: Option<String>,
}

impl LockSpec {
    /// The coarse lock on the whole target
    pub fn global(target: TargetRef) -> Self {
        Self {
            target,
            owner: None,
        }
    }

    /// A lock scoped to one kind of work on the target
    pub fn scoped(target: TargetRef, owner: impl Into<String>) -> Self {
        Self {
            target,
            owner: Some(owner.into()),
        }
    }
}

impl fmt::Display for LockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}#{}", self.target, owner),
            None => write!(f, "{}#*", self.target),
        }
    }
}

/// Acquires and releases processing locks in the shared store
#[derive(Clone)]
pub struct LockManager {
    store: SharedStore,
}

impl LockManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Take `(owner, target)` for `holder`.
    ///
    /// Re-acquiring a lock the holder already owns refreshes its heartbeat.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockConflict`] if another holder owns a conflicting
    /// lock on the target.
    pub fn acquire(&self, owner: Option<&str>, target: &TargetRef, holder: &HolderToken) -> Result<()> {
        self.try_acquire(owner, target, holder).map(|_| ())
    }

    /// Like [`LockManager::acquire`], returning whether a new row was created
    fn try_acquire(&self, owner: Option<&str>, target: &TargetRef, holder: &HolderToken) -> Result<bool> {
        let now = Utc::now();
        let result = update(&*self.store, |tables| -> Result<bool> {
            if let Some(blocking) = tables
                .locks
                .iter()
                .find(|l| l.conflicts_with(owner, target, holder))
            {
                return Err(Error::LockConflict {
                    target: *target,
                    owner: blocking.owner.clone(),
                    holder: blocking.holder,
                });
            }

            if let Some(held) = tables.locks.iter_mut().find(|l| l.is(owner, target, holder)) {
                held.last_heartbeat = now;
                return Ok(false);
            }

            tables.locks.push(LockRecord {
                owner: owner.map(str::to_string),
                target: *target,
                holder: *holder,
                acquired_at: now,
                last_heartbeat: now,
            });
            Ok(true)
        });

        match &result {
            Ok(created) => debug!(%target, owner = owner.unwrap_or("*"), %holder, created, "acquired lock"),
            Err(e) if e.is_lock_conflict() => {
                debug!(%target, owner = owner.unwrap_or("*"), %holder, error = %e, "lock busy")
            }
            Err(_) => {}
        }
        result
    }

    /// Acquire every lock in `specs` in deterministic order.
    ///
    /// If any acquisition fails, the locks this call newly took are released
    /// before the error is returned. On success the returned guard releases
    /// them when dropped.
    pub fn acquire_all(&self, specs: &[LockSpec], holder: &HolderToken) -> Result<LockGuard> {
        let mut ordered = specs.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut taken = Vec::with_capacity(ordered.len());
        for spec in &ordered {
            match self.try_acquire(spec.owner.as_deref(), &spec.target, holder) {
                Ok(created) => {
                    if created {
                        taken.push(spec.clone());
                    }
                }
                Err(e) => {
                    self.unwind(&taken, holder);
                    return Err(e);
                }
            }
        }

        Ok(LockGuard::new(self.clone(), *holder, ordered, taken))
    }

    fn unwind(&self, taken: &[LockSpec], holder: &HolderToken) {
        for spec in taken {
            if let Err(e) = self.release(spec.owner.as_deref(), &spec.target, holder) {
                warn!(lock = %spec, %holder, error = %e, "failed to release lock during unwind");
            }
        }
    }

    /// Delete the lock matching all three fields.
    ///
    /// Releasing a lock that is not held is a no-op; the return value says
    /// whether a row was deleted.
    pub fn release(&self, owner: Option<&str>, target: &TargetRef, holder: &HolderToken) -> Result<bool> {
        let removed = update(&*self.store, |tables| -> Result<bool> {
            let before = tables.locks.len();
            tables.locks.retain(|l| !l.is(owner, target, holder));
            Ok(tables.locks.len() != before)
        })?;

        if removed {
            debug!(%target, owner = owner.unwrap_or("*"), %holder, "released lock");
        }
        Ok(removed)
    }

    /// Release every lock `holder` has on `target`; returns rows deleted
    pub fn release_all(&self, target: &TargetRef, holder: &HolderToken) -> Result<usize> {
        update(&*self.store, |tables| -> Result<usize> {
            let before = tables.locks.len();
            tables
                .locks
                .retain(|l| !(l.target == *target && l.holder == *holder));
            Ok(before - tables.locks.len())
        })
    }

    /// Release every lock `holder` has on any target; returns rows deleted
    pub fn release_holder(&self, holder: &HolderToken) -> Result<usize> {
        update(&*self.store, |tables| -> Result<usize> {
            let before = tables.locks.len();
            tables.locks.retain(|l| l.holder != *holder);
            Ok(before - tables.locks.len())
        })
    }

    /// Refresh `last_heartbeat` on every lock `holder` owns.
    ///
    /// Returns how many rows were refreshed; zero means the holder's locks
    /// are gone (released, or reclaimed by the reaper).
    pub fn heartbeat(&self, holder: &HolderToken) -> Result<usize> {
        self.heartbeat_at(holder, Utc::now())
    }

    /// [`LockManager::heartbeat`] with an explicit clock
    pub fn heartbeat_at(&self, holder: &HolderToken, now: DateTime<Utc>) -> Result<usize> {
        update(&*self.store, |tables| -> Result<usize> {
            let mut refreshed = 0;
            for lock in tables.locks.iter_mut().filter(|l| l.holder == *holder) {
                lock.last_heartbeat = now;
                refreshed += 1;
            }
            Ok(refreshed)
        })
    }

    /// Every lock currently held on `target`
    pub fn locks_for(&self, target: &TargetRef) -> Result<Vec<LockRecord>> {
        Ok(view(&*self.store, |tables| {
            tables
                .locks
                .iter()
                .filter(|l| l.target == *target)
                .cloned()
                .collect()
        })?)
    }

    /// Every lock held by `holder`
    pub fn locks_held_by(&self, holder: &HolderToken) -> Result<Vec<LockRecord>> {
        Ok(view(&*self.store, |tables| {
            tables
                .locks
                .iter()
                .filter(|l| l.holder == *holder)
                .cloned()
                .collect()
        })?)
    }

    /// Every lock in the store
    pub fn all_locks(&self) -> Result<Vec<LockRecord>> {
        Ok(view(&*self.store, |tables| tables.locks.clone())?)
    }

    /// Whether acquiring `(owner, target)` would conflict for a new holder.
    ///
    /// A hint only: the answer may be stale by the time the caller acts.
    pub fn is_locked(&self, owner: Option<&str>, target: &TargetRef) -> Result<bool> {
        Ok(view(&*self.store, |tables| {
            tables.locks.iter().any(|l| {
                l.target == *target
                    && (owner.is_none() || l.owner.is_none() || l.owner.as_deref() == owner)
            })
        })?)
    }
}
