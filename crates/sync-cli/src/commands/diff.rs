//! Snapshot diff preview and manual propagation

use std::path::Path;

use colored::Colorize;
use sync_core::policy::{LISTING_SETTINGS, kinds_for_entity, schema_for};
use sync_core::{
    AffectedTarget, InstructionQueue, PolicyKind, Snapshot, SyncStatus, build_instructions,
    compute_diff, propagate,
};

use super::parse_target;
use crate::context::Context;
use crate::error::{CliError, Result};

/// Run `diff <policy> <old> <new>`
pub fn run_diff(
    ctx: &Context,
    policy: &str,
    old: &Path,
    new: &Path,
    status: &str,
    target: Option<&str>,
    enqueue: bool,
) -> Result<()> {
    let entity_type = entity_type_for(policy)?;
    let old = read_snapshot(old, &entity_type)?;
    let new = read_snapshot(new, &entity_type)?;
    let status: SyncStatus = status.parse()?;
    let tiers = ctx.config.tiers()?;

    let schema = schema_for(&entity_type)?;
    let diff = compute_diff(&old, &new, &schema)?;

    if diff.is_empty() {
        println!("{}", "No changes".green());
        return Ok(());
    }

    println!("{}", "Changed Groups".bold());
    for group in diff.changed_groups() {
        let mut flags = Vec::new();
        if diff.is_value_changed(group) {
            flags.push("value");
        }
        if diff.is_mode_changed(group) {
            flags.push("mode");
        }
        if diff.is_target_changed(group) {
            flags.push("target");
        }
        println!("  {} {} {}", "~".yellow(), group.cyan(), format!("({})", flags.join(", ")).dimmed());
    }
    println!();

    println!("{} (status: {})", "Instructions".bold(), status);
    let mut any = false;
    for kind in kinds_for_entity(&entity_type) {
        for data in build_instructions(kind, &diff, status, &tiers) {
            any = true;
            println!(
                "  [{:>3}] {} {}",
                data.priority.value(),
                data.instruction_type,
                format!("({})", kind.initiator()).dimmed()
            );
        }
    }
    if !any {
        println!("  {}", "None".dimmed());
    }

    if enqueue {
        let target = target
            .ok_or_else(|| CliError::user("--enqueue requires --target"))
            .and_then(parse_target)?;
        let queue = InstructionQueue::new(ctx.store.clone());
        let propagation = propagate(
            &old,
            &new,
            &[AffectedTarget::new(target, status)],
            &tiers,
            &queue,
        )?;
        println!();
        println!(
            "{} Enqueued {} instruction(s) for {}",
            "+".green(),
            propagation.instructions.len(),
            target.to_string().cyan()
        );
    }

    Ok(())
}

fn entity_type_for(policy: &str) -> Result<String> {
    let normalized = policy.trim().replace('-', "_");
    if normalized == LISTING_SETTINGS || normalized == "listing_settings" {
        return Ok(LISTING_SETTINGS.to_string());
    }
    Ok(normalized.parse::<PolicyKind>()?.entity_type())
}

fn read_snapshot(path: &Path, entity_type: &str) -> Result<Snapshot> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::user(format!("cannot read {}: {}", path.display(), e)))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .map_err(|e| CliError::user(format!("{} is not a snapshot: {}", path.display(), e)))?;

    if snapshot.entity_type != entity_type {
        return Err(CliError::user(format!(
            "{} holds a {} snapshot, expected {}",
            path.display(),
            snapshot.entity_type,
            entity_type
        )));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_accepts_kinds_and_listing_settings() {
        assert_eq!(entity_type_for("payment").unwrap(), "template_payment");
        assert_eq!(entity_type_for("return-policy").unwrap(), "template_return_policy");
        assert_eq!(entity_type_for("listing-settings").unwrap(), LISTING_SETTINGS);
        assert!(entity_type_for("tax").is_err());
    }
}
