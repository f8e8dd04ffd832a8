//! Stale lock reclamation and operation log pruning

use colored::Colorize;
use sync_core::{Reaper, StaleLock};

use crate::context::Context;
use crate::error::Result;

/// Run `reap`
pub fn run_reap(ctx: &Context, dry_run: bool) -> Result<()> {
    let reaper = Reaper::from_config(ctx.store.clone(), &ctx.config);

    if dry_run {
        let stale = reaper.find_stale()?;
        if stale.is_empty() {
            println!("{}", "No stale locks".green());
            return Ok(());
        }
        for lock in &stale {
            println!("{} Would release {}", "[dry-run]".yellow(), describe(lock));
        }
        return Ok(());
    }

    let report = reaper.sweep()?;
    if report.is_empty() {
        println!("{}", "No stale locks".green());
        return Ok(());
    }

    for lock in &report.released {
        println!("{} Released {}", "+".green(), describe(lock));
    }
    for holder in &report.failed_runs {
        println!("{} Marked run {} as failed", "+".green(), holder.to_string().dimmed());
    }
    if report.pruned_runs > 0 {
        println!("{} Pruned {} finished run(s)", "+".green(), report.pruned_runs);
    }
    Ok(())
}

fn describe(stale: &StaleLock) -> String {
    format!(
        "{} {} held by {} (idle {}s)",
        stale.lock.target,
        stale.lock.owner.as_deref().unwrap_or("*"),
        stale.lock.holder,
        stale.idle.num_seconds()
    )
}
