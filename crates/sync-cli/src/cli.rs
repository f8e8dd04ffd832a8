//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// channel-sync - Inspect and operate the marketplace synchronization core
#[derive(Parser, Debug)]
#[command(name = "channel-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Load configuration from this file instead of resolving channel-sync.toml
    #[arg(long, global = true, env = "CHANNEL_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file to operate on (overrides store.path)
    #[arg(long, global = true, env = "CHANNEL_SYNC_STORE")]
    pub store: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Inspect the instruction queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Inspect or release processing locks
    Locks {
        #[command(subcommand)]
        action: LockAction,
    },

    /// Show the operation log of a target
    ///
    /// Examples:
    ///   channel-sync runs --target ebay:listing:12
    Runs {
        /// Target reference (channel:kind:id)
        #[arg(long)]
        target: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Release locks whose holders stopped sending heartbeats
    Reap {
        /// List stale locks without releasing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare two snapshots and show the instructions they produce
    ///
    /// POLICY is a policy kind (payment, shipping, return_policy, description,
    /// selling_format, synchronization, category) or listing_settings.
    ///
    /// Examples:
    ///   channel-sync diff payment old.json new.json --status listed
    ///   channel-sync diff shipping old.json new.json --target ebay:listing_product:7 --enqueue
    Diff {
        /// Policy kind of the snapshots
        policy: String,

        /// Snapshot before the change (JSON)
        old: PathBuf,

        /// Snapshot after the change (JSON)
        new: PathBuf,

        /// Channel status of the affected target
        #[arg(long, default_value = "not_listed")]
        status: String,

        /// Target the instructions are for
        #[arg(long)]
        target: Option<String>,

        /// Add the instructions to the queue (requires --target)
        #[arg(long, requires = "target")]
        enqueue: bool,
    },
}

/// Queue subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum QueueAction {
    /// List pending instructions in dequeue order
    List {
        /// Maximum number of instructions to show
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Only instructions from this initiator
        #[arg(long)]
        initiator: Option<String>,

        /// Only instructions at or above this priority
        #[arg(long)]
        min_priority: Option<u8>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show what is pending for one target
    Pending {
        /// Target reference (channel:kind:id)
        #[arg(long)]
        target: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

/// Lock subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LockAction {
    /// List held locks
    List {
        /// Only locks on this target
        #[arg(long)]
        target: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Tell whether a new runner could lock a target right now
    ///
    /// Examples:
    ///   channel-sync locks check --target ebay:listing:12
    ///   channel-sync locks check --target walmart:account:1 --owner server_synchronize
    Check {
        /// Target reference (channel:kind:id)
        #[arg(long)]
        target: String,

        /// Check the lock with this owner instead of the whole target
        #[arg(long)]
        owner: Option<String>,
    },

    /// Release locks of a holder on a target
    ///
    /// Without --owner every lock of the holder on the target is released.
    Release {
        /// Target reference (channel:kind:id)
        #[arg(long)]
        target: String,

        /// Holder token
        #[arg(long)]
        holder: String,

        /// Release only the lock with this owner
        #[arg(long)]
        owner: Option<String>,

        /// Release only the whole-target lock
        #[arg(long, conflicts_with = "owner")]
        global: bool,
    },
}
