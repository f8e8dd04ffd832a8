//! Group-level diff between two entity snapshots
//!
//! The diff engine answers one question: which attribute groups of a
//! template or policy changed in a mutation. It is a pure function over two
//! [`Snapshot`]s and the entity type's [`GroupSchema`].
//!
//! Template-link groups are reported at two granularities so builders can
//! prioritize them differently:
//!
//! - **value changed**: the linked content was edited
//! - **mode changed**: the link moved between parent, custom and template
//! - **target changed**: a different template or custom override was linked
//!   under the same mode

mod snapshot;

pub use snapshot::{GroupDefinition, GroupKind, GroupSchema, LinkMode, Snapshot, TemplateLink};

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{Error, Result};

/// How a single group changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupChange {
    pub value_changed: bool,
    pub mode_changed: bool,
    pub target_changed: bool,
    /// The group is a template link
    pub link: bool,
}

impl GroupChange {
    fn any(&self) -> bool {
        self.value_changed || self.mode_changed || self.target_changed
    }

    /// The link moved but the content it resolves to is the same
    pub fn is_link_only(&self) -> bool {
        self.link && !self.value_changed && (self.mode_changed || self.target_changed)
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    entity_type: String,
    changes: BTreeMap<String, GroupChange>,
}

impl DiffResult {
    /// A diff with no changes
    pub fn unchanged(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            changes: BTreeMap::new(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Names of every changed group, sorted
    pub fn changed_groups(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn change(&self, group: &str) -> Option<&GroupChange> {
        self.changes.get(group)
    }

    pub fn is_changed(&self, group: &str) -> bool {
        self.changes.contains_key(group)
    }

    pub fn is_value_changed(&self, group: &str) -> bool {
        self.change(group).is_some_and(|c| c.value_changed)
    }

    pub fn is_mode_changed(&self, group: &str) -> bool {
        self.change(group).is_some_and(|c| c.mode_changed)
    }

    pub fn is_target_changed(&self, group: &str) -> bool {
        self.change(group).is_some_and(|c| c.target_changed)
    }
}

/// Compare two snapshots of the same entity type group by group.
///
/// A group absent from both snapshots is never reported; a group present in
/// only one snapshot always is.
///
/// # Errors
///
/// Returns [`Error::SchemaMismatch`] if either snapshot belongs to another
/// entity type, contains a group the schema does not define, or holds a value
/// that does not fit its group kind.
pub fn compute_diff(old: &Snapshot, new: &Snapshot, schema: &GroupSchema) -> Result<DiffResult> {
    check_shape(old, schema)?;
    check_shape(new, schema)?;

    let mut changes = BTreeMap::new();
    for def in &schema.groups {
        let change = match (old.group(&def.name), new.group(&def.name)) {
            (None, None) => continue,
            (Some(_), None) | (None, Some(_)) => GroupChange {
                value_changed: true,
                mode_changed: def.kind == GroupKind::TemplateLink,
                target_changed: false,
                link: def.kind == GroupKind::TemplateLink,
            },
            (Some(before), Some(after)) => compare_group(schema, def, before, after)?,
        };

        if change.any() {
            changes.insert(def.name.clone(), change);
        }
    }

    Ok(DiffResult {
        entity_type: schema.entity_type.clone(),
        changes,
    })
}

fn check_shape(snapshot: &Snapshot, schema: &GroupSchema) -> Result<()> {
    if snapshot.entity_type != schema.entity_type {
        return Err(mismatch(
            schema,
            format!("snapshot is of type {}", snapshot.entity_type),
        ));
    }

    if let Some(unknown) = snapshot.groups.keys().find(|g| schema.group(g).is_none()) {
        return Err(mismatch(schema, format!("unknown group {}", unknown)));
    }

    Ok(())
}

fn compare_group(
    schema: &GroupSchema,
    def: &GroupDefinition,
    before: &Value,
    after: &Value,
) -> Result<GroupChange> {
    let change = match def.kind {
        GroupKind::Scalar => GroupChange {
            value_changed: before != after,
            ..GroupChange::default()
        },
        GroupKind::Mapping => GroupChange {
            value_changed: normalize_mapping(schema, def, before)?
                != normalize_mapping(schema, def, after)?,
            ..GroupChange::default()
        },
        GroupKind::TemplateLink => {
            let before = parse_link(schema, def, before)?;
            let after = parse_link(schema, def, after)?;
            let mode_changed = before.mode != after.mode;

            GroupChange {
                value_changed: normalize(&before.data) != normalize(&after.data),
                mode_changed,
                target_changed: !mode_changed
                    && (before.template_id != after.template_id
                        || before.custom_id != after.custom_id),
                link: true,
            }
        }
    };

    Ok(change)
}

fn normalize_mapping(schema: &GroupSchema, def: &GroupDefinition, value: &Value) -> Result<Value> {
    match value {
        Value::Object(_) | Value::Null => Ok(normalize(value)),
        _ => Err(mismatch(
            schema,
            format!("group {} must hold a mapping", def.name),
        )),
    }
}

fn parse_link(schema: &GroupSchema, def: &GroupDefinition, value: &Value) -> Result<TemplateLink> {
    serde_json::from_value(value.clone()).map_err(|e| {
        mismatch(
            schema,
            format!("group {} is not a template link: {}", def.name, e),
        )
    })
}

/// Rebuild objects with sorted keys so comparison ignores insertion order
fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, normalize(v))).collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), v))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}

fn mismatch(schema: &GroupSchema, reason: String) -> Error {
    Error::SchemaMismatch {
        entity_type: schema.entity_type.clone(),
        reason,
    }
}
