//! Snapshot builders for common scenarios.

use serde_json::{Value, json};
use sync_core::policy::LISTING_SETTINGS;
use sync_core::{PolicyKind, Snapshot, TemplateLink};

/// A payment template with the given accepted methods
pub fn payment(methods: &[&str]) -> Snapshot {
    Snapshot::new(PolicyKind::Payment.entity_type())
        .with_group("payment", json!({ "methods": methods, "immediate": false }))
}

/// A shipping template with a handling time
pub fn shipping(handling_days: u32) -> Snapshot {
    Snapshot::new(PolicyKind::Shipping.entity_type())
        .with_group("shipping", json!({ "handling_days": handling_days, "service": "standard" }))
}

/// A description template
pub fn description(title: &str, images: &[&str]) -> Snapshot {
    Snapshot::new(PolicyKind::Description.entity_type())
        .with_group("title", json!(title))
        .with_group("subtitle", json!(""))
        .with_group("description", json!(format!("<p>{}</p>", title)))
        .with_group("images", json!({ "gallery": images }))
}

/// Listing settings linking every kind to its parent, with empty data
pub fn listing_settings() -> Snapshot {
    PolicyKind::ALL
        .into_iter()
        .filter_map(PolicyKind::link_group)
        .fold(Snapshot::new(LISTING_SETTINGS), |snap, group| {
            snap.with_group(group, TemplateLink::parent(Value::Null).to_value())
        })
}

/// `base` with one link group replaced
pub fn with_link(base: Snapshot, kind: PolicyKind, link: TemplateLink) -> Snapshot {
    match kind.link_group() {
        Some(group) => base.with_group(group, link.to_value()),
        None => base,
    }
}
