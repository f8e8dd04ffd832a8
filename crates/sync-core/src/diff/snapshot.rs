//! Entity snapshots and the group schemas they are compared against

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a group's value is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// Compared exactly
    Scalar,
    /// A key/value mapping; key order is irrelevant
    Mapping,
    /// A reference to a policy: parent, custom override, or explicit template
    TemplateLink,
}

/// A named attribute group within an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub name: String,
    pub kind: GroupKind,
}

impl GroupDefinition {
    pub fn new(name: impl Into<String>, kind: GroupKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The static set of groups an entity type is made of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSchema {
    pub entity_type: String,
    pub groups: Vec<GroupDefinition>,
}

impl GroupSchema {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            groups: Vec::new(),
        }
    }

    /// Add a group definition
    pub fn with_group(mut self, name: impl Into<String>, kind: GroupKind) -> Self {
        self.groups.push(GroupDefinition::new(name, kind));
        self
    }

    /// Look up a group by name
    pub fn group(&self, name: &str) -> Option<&GroupDefinition> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Immutable capture of an entity's groups before or after a mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entity_type: String,
    #[serde(default)]
    pub groups: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Create an empty snapshot for an entity type
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            groups: BTreeMap::new(),
        }
    }

    /// Set a group's serialized value
    pub fn with_group(mut self, name: impl Into<String>, value: Value) -> Self {
        self.groups.insert(name.into(), value);
        self
    }

    /// Get a group's serialized value
    pub fn group(&self, name: &str) -> Option<&Value> {
        self.groups.get(name)
    }
}

/// Which policy a template-link group currently resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Inherited from the parent listing
    Parent,
    /// Inline override owned by the entity
    Custom,
    /// Explicitly linked shared template
    Template,
}

/// Serialized shape of a [`GroupKind::TemplateLink`] group.
///
/// ```json
/// { "mode": "template", "template_id": 4, "data": { "...": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateLink {
    pub mode: LinkMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<u64>,
    /// Effective policy content the link resolves to
    #[serde(default)]
    pub data: Value,
}

impl TemplateLink {
    pub fn parent(data: Value) -> Self {
        Self {
            mode: LinkMode::Parent,
            template_id: None,
            custom_id: None,
            data,
        }
    }

    pub fn custom(custom_id: u64, data: Value) -> Self {
        Self {
            mode: LinkMode::Custom,
            template_id: None,
            custom_id: Some(custom_id),
            data,
        }
    }

    pub fn template(template_id: u64, data: Value) -> Self {
        Self {
            mode: LinkMode::Template,
            template_id: Some(template_id),
            custom_id: None,
            data,
        }
    }

    /// Serialize for storage in a [`Snapshot`]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
