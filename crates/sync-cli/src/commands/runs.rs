//! Operation log of a target

use colored::Colorize;
use sync_core::{RunLog, RunStatus};

use super::{parse_target, print_json};
use crate::context::Context;
use crate::error::Result;

/// Run `runs --target`
pub fn run_runs(ctx: &Context, target: &str, json: bool) -> Result<()> {
    let target = parse_target(target)?;
    let history = RunLog::new(ctx.store.clone()).history(&target)?;

    if json {
        return print_json(&history);
    }

    if history.is_empty() {
        println!("No runs recorded for {}", target.to_string().cyan());
        return Ok(());
    }

    println!("{} {}", "Operation Log".bold(), target.to_string().cyan());
    println!();
    for run in &history {
        let padded = format!("{:<10}", run.status.as_str());
        let status = match run.status {
            RunStatus::Succeeded => padded.green(),
            RunStatus::Failed => padded.red(),
            RunStatus::Pending | RunStatus::Running => padded.yellow(),
        };
        println!(
            "  {} {} {} {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            run.operation.bold(),
            run.holder.to_string().dimmed()
        );
        if let Some(error) = &run.error {
            println!("      {}", error.dimmed());
        }
    }
    Ok(())
}
