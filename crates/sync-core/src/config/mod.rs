//! Configuration for the synchronization core
//!
//! ```toml
//! [locks]
//! stale_after_secs = 900
//! heartbeat_interval_secs = 60
//!
//! [queue]
//! batch_size = 100
//!
//! [runs]
//! retain_secs = 604800
//!
//! [priorities]
//! listed = 30
//! not_listed = 5
//!
//! [store]
//! path = "sync-state.json"
//! ```

mod resolver;
mod settings;

pub use resolver::{CONFIG_FILE, ConfigResolver, LOCAL_CONFIG_FILE};
pub use settings::{
    LockSettings, PrioritySettings, QueueSettings, RunSettings, StoreSettings, SyncConfig,
};
