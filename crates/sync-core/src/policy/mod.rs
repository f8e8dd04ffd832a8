//! Policy kinds and the attribute groups each one is made of
//!
//! Every policy kind (payment, shipping, ...) is a shared template that many
//! listing products link to. A kind publishes:
//!
//! - the group schema its snapshots are diffed against
//! - a rules table mapping each group to the instruction a change emits
//! - the initiator under which its instructions are queued
//!
//! Listing products link to policies through the listing-settings entity,
//! whose groups are [`GroupKind::TemplateLink`]s named after the kinds.

mod builder;
mod processor;

pub use builder::{InstructionData, PriorityTiers, SyncStatus, build_instructions};
pub use processor::{AffectedTarget, ChangeProcessor, Propagation, plan_propagation, propagate};

use std::fmt;
use std::str::FromStr;

use crate::diff::{GroupKind, GroupSchema};
use crate::queue::InstructionType;
use crate::{Error, Result};

/// Entity type of the listing-settings snapshot holding template links
pub const LISTING_SETTINGS: &str = "listing_product_settings";

/// One row of a policy's rules table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRule {
    pub group: &'static str,
    pub kind: GroupKind,
    pub instruction_type: InstructionType,
}

const fn rule(group: &'static str, kind: GroupKind, instruction_type: InstructionType) -> GroupRule {
    GroupRule {
        group,
        kind,
        instruction_type,
    }
}

const PAYMENT_RULES: &[GroupRule] = &[rule(
    "payment",
    GroupKind::Mapping,
    InstructionType::PaymentDataChanged,
)];

const SHIPPING_RULES: &[GroupRule] = &[rule(
    "shipping",
    GroupKind::Mapping,
    InstructionType::ShippingDataChanged,
)];

const RETURN_POLICY_RULES: &[GroupRule] = &[rule(
    "return_policy",
    GroupKind::Mapping,
    InstructionType::ReturnDataChanged,
)];

const DESCRIPTION_RULES: &[GroupRule] = &[
    rule("title", GroupKind::Scalar, InstructionType::TitleDataChanged),
    rule("subtitle", GroupKind::Scalar, InstructionType::SubtitleDataChanged),
    rule("description", GroupKind::Scalar, InstructionType::DescriptionDataChanged),
    rule("images", GroupKind::Mapping, InstructionType::ImagesDataChanged),
];

const SELLING_FORMAT_RULES: &[GroupRule] = &[
    rule("qty", GroupKind::Mapping, InstructionType::QtyDataChanged),
    rule("price", GroupKind::Mapping, InstructionType::PriceDataChanged),
    rule("format", GroupKind::Scalar, InstructionType::OtherDataChanged),
];

const SYNCHRONIZATION_RULES: &[GroupRule] = &[
    rule("list_rules", GroupKind::Mapping, InstructionType::SynchListRulesChanged),
    rule("relist_rules", GroupKind::Mapping, InstructionType::SynchRelistRulesChanged),
    rule("revise_rules", GroupKind::Mapping, InstructionType::SynchReviseRulesChanged),
    rule("stop_rules", GroupKind::Mapping, InstructionType::SynchStopRulesChanged),
];

const CATEGORY_RULES: &[GroupRule] = &[
    rule("category", GroupKind::Mapping, InstructionType::CategoryDataChanged),
    rule("specifics", GroupKind::Mapping, InstructionType::SpecificsDataChanged),
];

/// A kind of shared policy/template
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyKind {
    Payment,
    Shipping,
    ReturnPolicy,
    Description,
    SellingFormat,
    Synchronization,
    Category,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 7] = [
        PolicyKind::Payment,
        PolicyKind::Shipping,
        PolicyKind::ReturnPolicy,
        PolicyKind::Description,
        PolicyKind::SellingFormat,
        PolicyKind::Synchronization,
        PolicyKind::Category,
    ];

    /// Short name used in entity types, initiators and the CLI
    pub fn nick(self) -> &'static str {
        match self {
            Self::Payment => "payment",
            Self::Shipping => "shipping",
            Self::ReturnPolicy => "return_policy",
            Self::Description => "description",
            Self::SellingFormat => "selling_format",
            Self::Synchronization => "synchronization",
            Self::Category => "category",
        }
    }

    /// Fixed initiator of every instruction this kind emits
    pub fn initiator(self) -> String {
        format!("template_{}_change_processor", self.nick())
    }

    /// Entity type of this kind's own snapshots
    pub fn entity_type(self) -> String {
        format!("template_{}", self.nick())
    }

    pub fn rules(self) -> &'static [GroupRule] {
        match self {
            Self::Payment => PAYMENT_RULES,
            Self::Shipping => SHIPPING_RULES,
            Self::ReturnPolicy => RETURN_POLICY_RULES,
            Self::Description => DESCRIPTION_RULES,
            Self::SellingFormat => SELLING_FORMAT_RULES,
            Self::Synchronization => SYNCHRONIZATION_RULES,
            Self::Category => CATEGORY_RULES,
        }
    }

    /// Every instruction type this kind can emit
    pub fn instruction_types(self) -> impl Iterator<Item = InstructionType> {
        self.rules().iter().map(|r| r.instruction_type)
    }

    /// Name of the listing-settings group linking to this kind.
    ///
    /// Categories are assigned per product, not linked, so they have none.
    pub fn link_group(self) -> Option<&'static str> {
        match self {
            Self::Category => None,
            other => Some(other.nick()),
        }
    }

    pub fn schema(self) -> GroupSchema {
        self.rules()
            .iter()
            .fold(GroupSchema::new(self.entity_type()), |schema, r| {
                schema.with_group(r.group, r.kind)
            })
    }

    /// The kind whose snapshots have `entity_type`
    pub fn from_entity_type(entity_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.entity_type() == entity_type)
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nick())
    }
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.nick() == normalized)
            .ok_or_else(|| Error::UnknownPolicy {
                name: s.to_string(),
            })
    }
}

/// Schema of the listing-settings entity: one template link per linkable kind
pub fn listing_settings_schema() -> GroupSchema {
    PolicyKind::ALL
        .into_iter()
        .filter_map(PolicyKind::link_group)
        .fold(GroupSchema::new(LISTING_SETTINGS), |schema, group| {
            schema.with_group(group, GroupKind::TemplateLink)
        })
}

/// Schema for any known entity type
pub fn schema_for(entity_type: &str) -> Result<GroupSchema> {
    if entity_type == LISTING_SETTINGS {
        return Ok(listing_settings_schema());
    }
    PolicyKind::from_entity_type(entity_type)
        .map(PolicyKind::schema)
        .ok_or_else(|| Error::UnknownPolicy {
            name: entity_type.to_string(),
        })
}

/// Policy kinds whose builders may react to a diff of `entity_type`
pub fn kinds_for_entity(entity_type: &str) -> Vec<PolicyKind> {
    if entity_type == LISTING_SETTINGS {
        return PolicyKind::ALL
            .into_iter()
            .filter(|kind| kind.link_group().is_some())
            .collect();
    }
    PolicyKind::from_entity_type(entity_type).into_iter().collect()
}
