//! Scoped ownership of a set of acquired locks

use std::fmt;

use tracing::{debug, warn};

use super::{LockManager, LockSpec};
use crate::Result;
use crate::target::HolderToken;

/// Releases the locks taken by [`LockManager::acquire_all`] when dropped.
///
/// Only locks that the acquisition newly created are released; a lock the
/// holder already owned before the call stays with whoever took it first.
/// Prefer [`LockGuard::release`] so release failures surface as errors; the
/// drop path can only log them.
#[must_use = "dropping the guard releases the locks immediately"]
pub struct LockGuard {
    manager: LockManager,
    holder: HolderToken,
    specs: Vec<LockSpec>,
    taken: Vec<LockSpec>,
    released: bool,
}

impl LockGuard {
    pub(super) fn new(
        manager: LockManager,
        holder: HolderToken,
        specs: Vec<LockSpec>,
        taken: Vec<LockSpec>,
    ) -> Self {
        Self {
            manager,
            holder,
            specs,
            taken,
            released: false,
        }
    }

    pub fn holder(&self) -> &HolderToken {
        &self.holder
    }

    /// Every lock the guarded operation required, in acquisition order
    pub fn specs(&self) -> &[LockSpec] {
        &self.specs
    }

    /// Release the guarded locks now, in reverse acquisition order.
    ///
    /// Returns how many rows were deleted. Every lock is attempted even if an
    /// earlier release fails; the first error is returned.
    pub fn release(mut self) -> Result<usize> {
        self.released = true;
        let mut released = 0;
        let mut first_error = None;

        for spec in self.taken.iter().rev() {
            match self
                .manager
                .release(spec.owner.as_deref(), &spec.target, &self.holder)
            {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(lock = %spec, holder = %self.holder, error = %e, "failed to release lock");
                    first_error.get_or_insert(e);
                }
            }
        }

        debug!(holder = %self.holder, released, "released guarded locks");
        match first_error {
            Some(e) => Err(e),
            None => Ok(released),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        for spec in self.taken.iter().rev() {
            if let Err(e) = self
                .manager
                .release(spec.owner.as_deref(), &spec.target, &self.holder)
            {
                warn!(lock = %spec, holder = %self.holder, error = %e, "failed to release lock on drop");
            }
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("holder", &self.holder)
            .field("specs", &self.specs)
            .field("taken", &self.taken.len())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
