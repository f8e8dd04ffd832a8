//! channel-sync CLI
//!
//! Operator tooling for the synchronization core: inspect the instruction
//! queue, locks and operation log, reclaim stale locks, and preview what a
//! template change would enqueue.

mod cli;
mod commands;
mod context;
mod error;

use std::path::Path;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, LockAction, QueueAction};
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e.display_message());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        // A subscriber may already be set when embedded; verbose output is best effort
        if sync_core::logging::init("debug").is_ok() {
            tracing::debug!("Verbose mode enabled");
        }
    }

    let Some(command) = cli.command else {
        println!("{} marketplace synchronization core", "channel-sync".green().bold());
        println!();
        println!("Run {} for available commands.", "channel-sync --help".cyan());
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let ctx = Context::load(&cwd, cli.config.as_deref(), cli.store.as_deref())?;
    execute_command(&ctx, command)
}

fn execute_command(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Queue { action } => match action {
            QueueAction::List {
                limit,
                initiator,
                min_priority,
                json,
            } => commands::run_queue_list(ctx, limit, initiator.as_deref(), min_priority, json),
            QueueAction::Pending { target, json } => commands::run_queue_pending(ctx, &target, json),
        },
        Commands::Locks { action } => match action {
            LockAction::List { target, json } => commands::run_locks_list(ctx, target.as_deref(), json),
            LockAction::Check { target, owner } => commands::run_locks_check(ctx, &target, owner.as_deref()),
            LockAction::Release {
                target,
                holder,
                owner,
                global,
            } => commands::run_locks_release(ctx, &target, &holder, owner.as_deref(), global),
        },
        Commands::Runs { target, json } => commands::run_runs(ctx, &target, json),
        Commands::Reap { dry_run } => commands::run_reap(ctx, dry_run),
        Commands::Diff {
            policy,
            old,
            new,
            status,
            target,
            enqueue,
        } => commands::run_diff(
            ctx,
            &policy,
            Path::new(&old),
            Path::new(&new),
            &status,
            target.as_deref(),
            enqueue,
        ),
    }
}
