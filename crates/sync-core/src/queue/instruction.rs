//! Instruction rows: units of pending synchronization work

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::target::TargetRef;

/// Scheduling weight of an instruction on a 0–100 ordinal scale.
///
/// Only two tiers are assigned by the built-in builders:
///
/// | tier | value | meaning |
/// |------|-------|---------|
/// | [`Priority::LISTED`] | 30 | target is live on the channel; shoppers may see stale data |
/// | [`Priority::NOT_LISTED`] | 5 | target is not live; reconcile eventually |
///
/// Higher values are dequeued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(0);
    pub const NOT_LISTED: Priority = Priority(5);
    pub const LISTED: Priority = Priority(30);
    pub const MAX: Priority = Priority(100);

    /// Create a priority, rejecting values above [`Priority::MAX`]
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX.0).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("priority {} exceeds {}", value, Self::MAX.0))
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What must be re-sent to the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionType {
    PaymentDataChanged,
    ShippingDataChanged,
    ReturnDataChanged,
    TitleDataChanged,
    SubtitleDataChanged,
    DescriptionDataChanged,
    ImagesDataChanged,
    QtyDataChanged,
    PriceDataChanged,
    OtherDataChanged,
    SynchListRulesChanged,
    SynchRelistRulesChanged,
    SynchReviseRulesChanged,
    SynchStopRulesChanged,
    CategoryDataChanged,
    SpecificsDataChanged,
}

impl InstructionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PaymentDataChanged => "PAYMENT_DATA_CHANGED",
            Self::ShippingDataChanged => "SHIPPING_DATA_CHANGED",
            Self::ReturnDataChanged => "RETURN_DATA_CHANGED",
            Self::TitleDataChanged => "TITLE_DATA_CHANGED",
            Self::SubtitleDataChanged => "SUBTITLE_DATA_CHANGED",
            Self::DescriptionDataChanged => "DESCRIPTION_DATA_CHANGED",
            Self::ImagesDataChanged => "IMAGES_DATA_CHANGED",
            Self::QtyDataChanged => "QTY_DATA_CHANGED",
            Self::PriceDataChanged => "PRICE_DATA_CHANGED",
            Self::OtherDataChanged => "OTHER_DATA_CHANGED",
            Self::SynchListRulesChanged => "SYNCH_LIST_RULES_CHANGED",
            Self::SynchRelistRulesChanged => "SYNCH_RELIST_RULES_CHANGED",
            Self::SynchReviseRulesChanged => "SYNCH_REVISE_RULES_CHANGED",
            Self::SynchStopRulesChanged => "SYNCH_STOP_RULES_CHANGED",
            Self::CategoryDataChanged => "CATEGORY_DATA_CHANGED",
            Self::SpecificsDataChanged => "SPECIFICS_DATA_CHANGED",
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniqueness key of a pending instruction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstructionKey {
    pub initiator: String,
    pub target: TargetRef,
    pub instruction_type: InstructionType,
}

/// An instruction as a runner read it from the queue.
///
/// Completing a claim removes the row only if nobody merged a newer change
/// into it since the read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstructionClaim {
    pub key: InstructionKey,
    pub revision: u64,
}

/// A unit of pending synchronization work derived from a detected change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Subsystem that created the instruction; scopes deduplication
    pub initiator: String,
    pub target: TargetRef,
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Bumped every time a duplicate is merged into the queued row
    #[serde(default)]
    pub revision: u64,
}

impl Instruction {
    /// Create an instruction stamped with the current time
    pub fn new(
        initiator: impl Into<String>,
        target: TargetRef,
        instruction_type: InstructionType,
        priority: Priority,
    ) -> Self {
        Self {
            initiator: initiator.into(),
            target,
            instruction_type,
            priority,
            created_at: Utc::now(),
            revision: 0,
        }
    }

    /// Override the creation time (useful for testing/replay)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn key(&self) -> InstructionKey {
        InstructionKey {
            initiator: self.initiator.clone(),
            target: self.target,
            instruction_type: self.instruction_type,
        }
    }

    /// This instruction at its current revision
    pub fn claim(&self) -> InstructionClaim {
        InstructionClaim {
            key: self.key(),
            revision: self.revision,
        }
    }

    pub fn matches_key(&self, key: &InstructionKey) -> bool {
        self.initiator == key.initiator
            && self.target == key.target
            && self.instruction_type == key.instruction_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Channel;

    #[test]
    fn priority_rejects_values_above_scale() {
        assert_eq!(Priority::new(100), Some(Priority::MAX));
        assert_eq!(Priority::new(101), None);
        assert!(Priority::LISTED > Priority::NOT_LISTED);
    }

    #[test]
    fn priority_deserialization_is_range_checked() {
        assert_eq!(serde_json::from_str::<Priority>("30").unwrap(), Priority::LISTED);
        assert!(serde_json::from_str::<Priority>("250").is_err());
    }

    #[test]
    fn instruction_type_serializes_in_screaming_case() {
        let json = serde_json::to_string(&InstructionType::PaymentDataChanged).unwrap();
        assert_eq!(json, "\"PAYMENT_DATA_CHANGED\"");
        assert_eq!(InstructionType::PaymentDataChanged.to_string(), "PAYMENT_DATA_CHANGED");
    }

    #[test]
    fn key_identifies_instruction() {
        let target = TargetRef::listing_product(Channel::Ebay, 3);
        let instruction = Instruction::new(
            "template_payment_change_processor",
            target,
            InstructionType::PaymentDataChanged,
            Priority::LISTED,
        );
        assert!(instruction.matches_key(&instruction.key()));
    }
}
