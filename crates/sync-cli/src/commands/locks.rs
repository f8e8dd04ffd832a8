//! Lock inspection and manual release

use chrono::{DateTime, Utc};
use colored::Colorize;
use sync_core::{HolderToken, LockManager, LockRecord};

use super::{parse_target, print_json};
use crate::context::Context;
use crate::error::{CliError, Result};

/// Run `locks list`
pub fn run_locks_list(ctx: &Context, target: Option<&str>, json: bool) -> Result<()> {
    let locks = LockManager::new(ctx.store.clone());
    let records = match target {
        Some(target) => locks.locks_for(&parse_target(target)?)?,
        None => locks.all_locks()?,
    };

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("{}", "No locks held".dimmed());
        return Ok(());
    }

    println!("{}", "Processing Locks".bold());
    println!();
    for record in &records {
        print_lock(record);
    }
    Ok(())
}

/// Run `locks check`
pub fn run_locks_check(ctx: &Context, target: &str, owner: Option<&str>) -> Result<()> {
    let target = parse_target(target)?;
    let locks = LockManager::new(ctx.store.clone());
    let label = match owner {
        Some(owner) => format!("{} ({})", target, owner),
        None => target.to_string(),
    };

    if !locks.is_locked(owner, &target)? {
        println!("{} {} is free", "+".green(), label.cyan());
        return Ok(());
    }

    println!("{} {} is busy", "!".yellow(), label.cyan());
    for record in locks.locks_for(&target)? {
        if owner.is_none() || record.owner.is_none() || record.owner.as_deref() == owner {
            print_lock(&record);
        }
    }
    Ok(())
}

/// Run `locks release`
pub fn run_locks_release(
    ctx: &Context,
    target: &str,
    holder: &str,
    owner: Option<&str>,
    global: bool,
) -> Result<()> {
    let target = parse_target(target)?;
    let holder: HolderToken = holder
        .parse()
        .map_err(|e| CliError::user(format!("invalid holder token '{}': {}", holder, e)))?;
    let locks = LockManager::new(ctx.store.clone());

    let released = if global || owner.is_some() {
        usize::from(locks.release(owner, &target, &holder)?)
    } else {
        locks.release_all(&target, &holder)?
    };

    if released == 0 {
        println!("{} no matching lock held by {}", "-".dimmed(), holder);
    } else {
        tracing::info!(%target, %holder, released, "Released locks manually");
        println!("{} Released {} lock(s) on {}", "+".green(), released, target.to_string().cyan());
    }
    Ok(())
}

fn print_lock(record: &LockRecord) {
    println!(
        "  {} {} {} {}",
        record.target.to_string().cyan(),
        record.owner.as_deref().unwrap_or("*").bold(),
        record.holder.to_string().dimmed(),
        format!("(heartbeat {})", format_age(record.last_heartbeat)).dimmed()
    );
}

/// Age of a timestamp as `Ns ago`, `Nm ago` or `Nh ago`
fn format_age(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..60 => format!("{}s ago", secs),
        60..3600 => format!("{}m ago", secs / 60),
        _ => format!("{}h ago", secs / 3600),
    }
}
