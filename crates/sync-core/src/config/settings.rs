//! Typed synchronization settings

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::policy::PriorityTiers;
use crate::queue::Priority;
use crate::{Error, Result};

/// Upper bound for any configured interval (one week)
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

/// Upper bound for operation log retention (one year)
const MAX_RETENTION_SECS: u64 = 365 * 24 * 60 * 60;

/// Lock heartbeat and staleness settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// A lock whose heartbeat is older than this is reclaimed by the reaper
    pub stale_after_secs: u64,
    /// How often runners refresh their locks
    pub heartbeat_interval_secs: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            stale_after_secs: 900,
            heartbeat_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Instructions dequeued per drain pass
    pub batch_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

/// Operation log retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Finished runs older than this are pruned by the reaper
    pub retain_secs: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            retain_secs: 7 * 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrioritySettings {
    pub listed: u8,
    pub not_listed: u8,
}

impl Default for PrioritySettings {
    fn default() -> Self {
        Self {
            listed: Priority::LISTED.value(),
            not_listed: Priority::NOT_LISTED.value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// State file; the extension picks the format
    pub path: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sync-state.json"),
        }
    }
}

/// Complete configuration of the synchronization core
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub locks: LockSettings,
    pub queue: QueueSettings,
    pub runs: RunSettings,
    pub priorities: PrioritySettings,
    pub store: StoreSettings,
}

impl SyncConfig {
    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a single TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Check that values are in range and mutually consistent
    pub fn validate(&self) -> Result<()> {
        let locks = &self.locks;
        if locks.heartbeat_interval_secs == 0 {
            return Err(invalid("locks.heartbeat_interval_secs must be positive"));
        }
        if locks.stale_after_secs > MAX_INTERVAL_SECS {
            return Err(invalid(format!(
                "locks.stale_after_secs must not exceed {}",
                MAX_INTERVAL_SECS
            )));
        }
        if locks.heartbeat_interval_secs >= locks.stale_after_secs {
            return Err(invalid(format!(
                "locks.heartbeat_interval_secs ({}) must be shorter than locks.stale_after_secs ({})",
                locks.heartbeat_interval_secs, locks.stale_after_secs
            )));
        }
        if self.runs.retain_secs > MAX_RETENTION_SECS {
            return Err(invalid(format!(
                "runs.retain_secs must not exceed {}",
                MAX_RETENTION_SECS
            )));
        }
        if self.queue.batch_size == 0 {
            return Err(invalid("queue.batch_size must be positive"));
        }
        for (name, value) in [
            ("listed", self.priorities.listed),
            ("not_listed", self.priorities.not_listed),
        ] {
            if Priority::new(value).is_none() {
                return Err(invalid(format!(
                    "priorities.{} must be within 0-{}",
                    name,
                    Priority::MAX
                )));
            }
        }
        Ok(())
    }

    pub fn tiers(&self) -> Result<PriorityTiers> {
        let tier = |value: u8| {
            Priority::new(value).ok_or_else(|| invalid(format!("priority {} out of range", value)))
        };
        Ok(PriorityTiers {
            listed: tier(self.priorities.listed)?,
            not_listed: tier(self.priorities.not_listed)?,
        })
    }

    pub fn stale_after(&self) -> Duration {
        seconds(self.locks.stale_after_secs, MAX_INTERVAL_SECS)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        seconds(self.locks.heartbeat_interval_secs, MAX_INTERVAL_SECS)
    }

    /// How long finished runs stay in the operation log
    pub fn run_retention(&self) -> Duration {
        seconds(self.runs.retain_secs, MAX_RETENTION_SECS)
    }
}

fn seconds(secs: u64, max: u64) -> Duration {
    Duration::seconds(secs.min(max) as i64)
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        message: message.into(),
    }
}
