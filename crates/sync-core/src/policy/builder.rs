//! Turning a diff into prioritized instruction data

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{LISTING_SETTINGS, PolicyKind};
use crate::diff::DiffResult;
use crate::queue::{InstructionType, Priority};
use crate::Error;

/// Where a target stands on its channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    NotListed,
    Listed,
    Stopped,
    Blocked,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotListed => "not_listed",
            Self::Listed => "listed",
            Self::Stopped => "stopped",
            Self::Blocked => "blocked",
        }
    }

    pub fn is_listed(self) -> bool {
        self == Self::Listed
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_listed" => Ok(Self::NotListed),
            "listed" => Ok(Self::Listed),
            "stopped" => Ok(Self::Stopped),
            "blocked" => Ok(Self::Blocked),
            _ => Err(Error::InvalidConfig {
                message: format!("unknown sync status: {}", s),
            }),
        }
    }
}

/// The two priority tiers builders assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityTiers {
    pub listed: Priority,
    pub not_listed: Priority,
}

impl Default for PriorityTiers {
    fn default() -> Self {
        Self {
            listed: Priority::LISTED,
            not_listed: Priority::NOT_LISTED,
        }
    }
}

impl PriorityTiers {
    pub fn for_status(&self, status: SyncStatus) -> Priority {
        if status.is_listed() {
            self.listed
        } else {
            self.not_listed
        }
    }
}

/// An instruction before its initiator and target are attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionData {
    pub instruction_type: InstructionType,
    pub priority: Priority,
}

/// Instructions `kind` emits for `diff` on a target in `status`.
///
/// Reacts to diffs of the kind's own template, and to the kind's link group
/// in a listing-settings diff. Any other diff yields nothing. A link that
/// moved without changing the content it resolves to still emits, but only at
/// the not-listed tier. Output holds each instruction type at most once,
/// ordered by type.
pub fn build_instructions(
    kind: PolicyKind,
    diff: &DiffResult,
    status: SyncStatus,
    tiers: &PriorityTiers,
) -> Vec<InstructionData> {
    let mut emitted: BTreeMap<InstructionType, Priority> = BTreeMap::new();
    let mut emit = |instruction_type, priority| {
        emitted
            .entry(instruction_type)
            .and_modify(|p: &mut Priority| *p = (*p).max(priority))
            .or_insert(priority);
    };

    if diff.entity_type() == kind.entity_type() {
        for rule in kind.rules() {
            if diff.is_changed(rule.group) {
                emit(rule.instruction_type, tiers.for_status(status));
            }
        }
    } else if diff.entity_type() == LISTING_SETTINGS {
        let change = kind.link_group().and_then(|group| diff.change(group));
        if let Some(change) = change {
            let priority = if change.value_changed {
                tiers.for_status(status)
            } else {
                tiers.not_listed
            };
            for instruction_type in kind.instruction_types() {
                emit(instruction_type, priority);
            }
        }
    }

    emitted
        .into_iter()
        .map(|(instruction_type, priority)| InstructionData {
            instruction_type,
            priority,
        })
        .collect()
}
