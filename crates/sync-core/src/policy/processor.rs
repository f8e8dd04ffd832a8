//! Applying builders to the targets a change affects

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PolicyKind, PriorityTiers, SyncStatus, build_instructions, kinds_for_entity, schema_for};
use crate::diff::{DiffResult, Snapshot, compute_diff};
use crate::queue::{Instruction, InstructionQueue};
use crate::target::TargetRef;
use crate::{Error, Result};

/// A target touched by a mutation, with its current channel status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedTarget {
    pub target: TargetRef,
    #[serde(default)]
    pub status: SyncStatus,
}

impl AffectedTarget {
    pub fn new(target: TargetRef, status: SyncStatus) -> Self {
        Self { target, status }
    }
}

/// Turns one policy kind's view of a diff into queueable instructions
#[derive(Debug, Clone, Copy)]
pub struct ChangeProcessor {
    kind: PolicyKind,
    tiers: PriorityTiers,
}

impl ChangeProcessor {
    pub fn new(kind: PolicyKind, tiers: PriorityTiers) -> Self {
        Self { kind, tiers }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn initiator(&self) -> String {
        self.kind.initiator()
    }

    /// One instruction per emitted type per affected target
    pub fn process(&self, diff: &DiffResult, targets: &[AffectedTarget]) -> Vec<Instruction> {
        let initiator = self.initiator();
        targets
            .iter()
            .flat_map(|affected| {
                build_instructions(self.kind, diff, affected.status, &self.tiers)
                    .into_iter()
                    .map(|data| {
                        Instruction::new(
                            initiator.clone(),
                            affected.target,
                            data.instruction_type,
                            data.priority,
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// A computed diff and the instructions every interested kind derived from it
#[derive(Debug, Clone)]
pub struct Propagation {
    pub diff: DiffResult,
    pub instructions: Vec<Instruction>,
}

/// Diff `old` against `new` and run every interested processor over it.
///
/// The schema is looked up from the snapshots' entity type.
pub fn plan_propagation(
    old: &Snapshot,
    new: &Snapshot,
    targets: &[AffectedTarget],
    tiers: &PriorityTiers,
) -> Result<Propagation> {
    if old.entity_type != new.entity_type {
        return Err(Error::SchemaMismatch {
            entity_type: old.entity_type.clone(),
            reason: format!("new snapshot is of type {}", new.entity_type),
        });
    }

    let schema = schema_for(&old.entity_type)?;
    let diff = compute_diff(old, new, &schema)?;

    let instructions = kinds_for_entity(&old.entity_type)
        .into_iter()
        .flat_map(|kind| ChangeProcessor::new(kind, *tiers).process(&diff, targets))
        .collect();

    Ok(Propagation { diff, instructions })
}

/// [`plan_propagation`], then enqueue the result in one transaction
pub fn propagate(
    old: &Snapshot,
    new: &Snapshot,
    targets: &[AffectedTarget],
    tiers: &PriorityTiers,
    queue: &InstructionQueue,
) -> Result<Propagation> {
    let propagation = plan_propagation(old, new, targets, tiers)?;
    let inserted = queue.enqueue_all(propagation.instructions.clone())?;

    debug!(
        entity_type = %old.entity_type,
        changed = propagation.diff.changed_groups().count(),
        instructions = propagation.instructions.len(),
        inserted,
        "propagated change"
    );
    Ok(propagation)
}
