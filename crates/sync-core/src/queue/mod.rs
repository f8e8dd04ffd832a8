//! Durable, deduplicated, priority-ordered instruction queue
//!
//! Many producers (one per change processor) enqueue instructions; runners
//! read batches and remove what they completed. Delivery is at-least-once:
//! nothing leaves the queue except through [`InstructionQueue::remove`], so a
//! crash between dequeue and completion simply redelivers the instruction.

mod instruction;

pub use instruction::{Instruction, InstructionClaim, InstructionKey, InstructionType, Priority};

use std::cmp::Reverse;

use sync_store::{update, view};
use tracing::debug;

use crate::Result;
use crate::tables::{InstructionRow, SharedStore};
use crate::target::TargetRef;

/// Outcome of an [`InstructionQueue::enqueue`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new row was inserted
    Inserted,
    /// An existing row's priority was raised
    Raised,
    /// An existing row already had an equal or higher priority; only its
    /// revision moved
    Unchanged,
}

/// Selects which pending instructions a dequeue may return
#[derive(Debug, Clone, Default)]
pub struct InstructionFilter {
    pub target: Option<TargetRef>,
    pub initiator: Option<String>,
    pub types: Vec<InstructionType>,
    pub min_priority: Option<Priority>,
}

impl InstructionFilter {
    /// Match every instruction
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_target(mut self, target: TargetRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn for_initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = Some(initiator.into());
        self
    }

    pub fn with_type(mut self, instruction_type: InstructionType) -> Self {
        self.types.push(instruction_type);
        self
    }

    pub fn at_least(mut self, priority: Priority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn matches(&self, instruction: &Instruction) -> bool {
        self.target.is_none_or(|t| t == instruction.target)
            && self
                .initiator
                .as_deref()
                .is_none_or(|i| i == instruction.initiator)
            && (self.types.is_empty() || self.types.contains(&instruction.instruction_type))
            && self.min_priority.is_none_or(|p| instruction.priority >= p)
    }
}

/// Queue of pending instructions backed by the shared store
#[derive(Clone)]
pub struct InstructionQueue {
    store: SharedStore,
}

impl InstructionQueue {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Upsert by `(initiator, target, type)`.
    ///
    /// On conflict the stored priority becomes the max of both,
    /// `created_at` keeps the oldest value and the revision is bumped so an
    /// in-flight run cannot complete the newer change.
    pub fn enqueue(&self, instruction: Instruction) -> Result<EnqueueOutcome> {
        let outcome = update(&*self.store, |tables| -> Result<EnqueueOutcome> {
            Ok(upsert(&mut tables.next_seq, &mut tables.instructions, instruction.clone()))
        })?;

        debug!(
            initiator = %instruction.initiator,
            target = %instruction.target,
            instruction_type = %instruction.instruction_type,
            priority = %instruction.priority,
            ?outcome,
            "enqueued instruction"
        );
        Ok(outcome)
    }

    /// Enqueue many instructions in one transaction, merging duplicates.
    ///
    /// Returns the number of rows newly inserted.
    pub fn enqueue_all(&self, instructions: Vec<Instruction>) -> Result<usize> {
        if instructions.is_empty() {
            return Ok(0);
        }

        let inserted = update(&*self.store, |tables| -> Result<usize> {
            let mut inserted = 0;
            for instruction in instructions {
                if upsert(&mut tables.next_seq, &mut tables.instructions, instruction)
                    == EnqueueOutcome::Inserted
                {
                    inserted += 1;
                }
            }
            Ok(inserted)
        })?;

        debug!(inserted, "enqueued instruction batch");
        Ok(inserted)
    }

    /// Up to `limit` matching instructions, highest priority first, then
    /// oldest first, then in insertion order.
    ///
    /// Nothing is removed; removal is explicit. Never blocks.
    pub fn dequeue_batch(&self, limit: usize, filter: &InstructionFilter) -> Result<Vec<Instruction>> {
        let mut rows: Vec<InstructionRow> = view(&*self.store, |tables| {
            tables
                .instructions
                .iter()
                .filter(|row| filter.matches(&row.instruction))
                .cloned()
                .collect()
        })?;

        rows.sort_by_key(|row| {
            (
                Reverse(row.instruction.priority),
                row.instruction.created_at,
                row.seq,
            )
        });

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|row| row.instruction)
            .collect())
    }

    /// Remove one instruction. Removing an absent instruction is a no-op.
    ///
    /// Returns whether a row was deleted.
    pub fn remove(
        &self,
        initiator: &str,
        target: &TargetRef,
        instruction_type: InstructionType,
    ) -> Result<bool> {
        self.remove_key(&InstructionKey {
            initiator: initiator.to_string(),
            target: *target,
            instruction_type,
        })
    }

    /// Remove by key; see [`InstructionQueue::remove`]
    pub fn remove_key(&self, key: &InstructionKey) -> Result<bool> {
        Ok(self.remove_keys(std::slice::from_ref(key))? > 0)
    }

    /// Remove every listed key in one transaction; returns rows deleted
    pub fn remove_keys(&self, keys: &[InstructionKey]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        update(&*self.store, |tables| -> Result<usize> {
            let before = tables.instructions.len();
            tables
                .instructions
                .retain(|row| !keys.iter().any(|k| row.instruction.matches_key(k)));
            Ok(before - tables.instructions.len())
        })
    }

    /// Remove claimed rows that are still at the claimed revision.
    ///
    /// A row merged with a newer change after it was claimed stays queued for
    /// the next pass. Returns rows deleted.
    pub fn complete(&self, claims: &[InstructionClaim]) -> Result<usize> {
        if claims.is_empty() {
            return Ok(0);
        }

        let (removed, kept) = update(&*self.store, |tables| -> Result<(usize, usize)> {
            let before = tables.instructions.len();
            let mut kept = 0;
            tables.instructions.retain(|row| {
                let Some(claim) = claims.iter().find(|c| row.instruction.matches_key(&c.key)) else {
                    return true;
                };
                let changed = row.instruction.revision != claim.revision;
                if changed {
                    kept += 1;
                }
                changed
            });
            Ok((before - tables.instructions.len(), kept))
        })?;

        if kept > 0 {
            debug!(removed, kept, "instructions changed while in flight; kept for next pass");
        }
        Ok(removed)
    }

    /// Pending instructions for one target, in dequeue order
    pub fn list_pending(&self, target: &TargetRef) -> Result<Vec<Instruction>> {
        self.dequeue_batch(usize::MAX, &InstructionFilter::all().for_target(*target))
    }

    /// Number of pending instructions for one target
    pub fn pending_count(&self, target: &TargetRef) -> Result<usize> {
        Ok(view(&*self.store, |tables| {
            tables
                .instructions
                .iter()
                .filter(|row| row.instruction.target == *target)
                .count()
        })?)
    }
}

fn upsert(
    next_seq: &mut u64,
    rows: &mut Vec<InstructionRow>,
    instruction: Instruction,
) -> EnqueueOutcome {
    let key = instruction.key();
    if let Some(existing) = rows.iter_mut().find(|r| r.instruction.matches_key(&key)) {
        existing.instruction.revision += 1;
        if instruction.priority > existing.instruction.priority {
            existing.instruction.priority = instruction.priority;
            return EnqueueOutcome::Raised;
        }
        return EnqueueOutcome::Unchanged;
    }

    rows.push(InstructionRow {
        seq: *next_seq,
        instruction,
    });
    *next_seq += 1;
    EnqueueOutcome::Inserted
}
