//! Shared test utilities for the channel-sync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`channel`]: [`ScriptedChannel`], an executor that follows a script
//! - [`snapshots`]: snapshot builders for policy templates and listing settings
//! - [`workspace`]: [`TestWorkspace`], a temp directory with config and state

pub mod channel;
pub mod snapshots;
pub mod workspace;

pub use channel::{ScriptedChannel, Step};
pub use workspace::TestWorkspace;
