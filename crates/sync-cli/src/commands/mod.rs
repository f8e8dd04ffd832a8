//! Command implementations for sync-cli

pub mod diff;
pub mod locks;
pub mod queue;
pub mod reap;
pub mod runs;

pub use diff::run_diff;
pub use locks::{run_locks_check, run_locks_list, run_locks_release};
pub use queue::{run_queue_list, run_queue_pending};
pub use reap::run_reap;
pub use runs::run_runs;

use serde::Serialize;
use sync_core::TargetRef;

use crate::error::{CliError, Result};

/// Parse a `channel:kind:id` argument
pub(crate) fn parse_target(value: &str) -> Result<TargetRef> {
    value.parse::<TargetRef>().map_err(|_| {
        CliError::user(format!(
            "invalid target '{}' (expected channel:kind:id, e.g. ebay:listing:12)",
            value
        ))
    })
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
