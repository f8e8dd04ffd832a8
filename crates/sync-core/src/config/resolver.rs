//! Layered configuration loading
//!
//! Sources, later overriding earlier:
//!
//! 1. Global defaults (`<config_dir>/channel-sync/config.toml`)
//! 2. Project config (`channel-sync.toml`)
//! 3. Local overrides (`channel-sync.local.toml`), kept out of version control
//!
//! Tables are merged key by key, so an override only needs the keys it
//! changes.

use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;

use super::SyncConfig;
use crate::Result;

pub const CONFIG_FILE: &str = "channel-sync.toml";
pub const LOCAL_CONFIG_FILE: &str = "channel-sync.local.toml";

/// Resolves [`SyncConfig`] for a working directory
pub struct ConfigResolver {
    dir: PathBuf,

    /// Override for the global config directory (used for testing).
    /// When `None`, `dirs::config_dir()` is used.
    global_config_dir_override: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            global_config_dir_override: None,
        }
    }

    /// Create a resolver with a custom global config directory
    pub fn with_global_config_dir(dir: impl Into<PathBuf>, global_config_dir: PathBuf) -> Self {
        Self {
            dir: dir.into(),
            global_config_dir_override: Some(global_config_dir),
        }
    }

    fn global_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.global_config_dir_override {
            return Some(override_dir.clone());
        }
        dirs::config_dir().map(|d| d.join("channel-sync"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load, merge and validate every layer that exists.
    ///
    /// A relative `store.path` is resolved against the working directory.
    pub fn resolve(&self) -> Result<SyncConfig> {
        let mut merged = Value::Table(toml::map::Map::new());

        let layers = [
            self.global_config_dir().map(|d| d.join("config.toml")),
            Some(self.dir.join(CONFIG_FILE)),
            Some(self.dir.join(LOCAL_CONFIG_FILE)),
        ];
        for path in layers.into_iter().flatten() {
            if !path.is_file() {
                tracing::debug!(?path, "No config layer found, skipping");
                continue;
            }
            tracing::debug!(?path, "Loading config layer");
            let content = fs::read_to_string(&path)?;
            let layer: toml::Table = toml::from_str(&content)?;
            merge(&mut merged, Value::Table(layer));
        }

        let mut config: SyncConfig = merged.try_into()?;
        if config.store.path.is_relative() {
            config.store.path = self.dir.join(&config.store.path);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn has_config(&self) -> bool {
        self.dir.join(CONFIG_FILE).is_file()
    }

    pub fn has_local_overrides(&self) -> bool {
        self.dir.join(LOCAL_CONFIG_FILE).is_file()
    }
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn resolver(dir: &TempDir) -> ConfigResolver {
        // Point the global layer at an empty directory so the real user
        // config never leaks into tests
        ConfigResolver::with_global_config_dir(dir.path(), dir.path().join("global"))
    }

    #[test]
    fn defaults_when_no_config_exists() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir);
        assert!(!resolver.has_config());

        let config = resolver.resolve().unwrap();
        assert_eq!(config.locks.stale_after_secs, 900);
        assert_eq!(config.store.path, dir.path().join("sync-state.json"));
    }

    #[test]
    fn local_overrides_merge_on_top_of_project_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[locks]\nstale_after_secs = 600\nheartbeat_interval_secs = 30\n\n[queue]\nbatch_size = 10\n",
        )
        .unwrap();
        fs::write(dir.path().join(LOCAL_CONFIG_FILE), "[locks]\nstale_after_secs = 300\n").unwrap();

        let resolver = resolver(&dir);
        assert!(resolver.has_local_overrides());
        let config = resolver.resolve().unwrap();

        assert_eq!(config.locks.stale_after_secs, 300);
        assert_eq!(config.locks.heartbeat_interval_secs, 30);
        assert_eq!(config.queue.batch_size, 10);
    }

    #[test]
    fn global_layer_is_lowest_priority() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global");
        fs::create_dir_all(&global).unwrap();
        fs::write(global.join("config.toml"), "[queue]\nbatch_size = 7\n[priorities]\nlisted = 40\n").unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[queue]\nbatch_size = 9\n").unwrap();

        let config = resolver(&dir).resolve().unwrap();
        assert_eq!(config.queue.batch_size, 9);
        assert_eq!(config.priorities.listed, 40);
    }

    #[test]
    fn absolute_store_path_is_kept() {
        let dir = TempDir::new().unwrap();
        let absolute = dir.path().join("elsewhere").join("state.toml");
        fs::write(
            dir.path().join(CONFIG_FILE),
            format!("[store]\npath = {:?}\n", absolute.to_string_lossy()),
        )
        .unwrap();

        let config = resolver(&dir).resolve().unwrap();
        assert_eq!(config.store.path, absolute);
    }

    #[test]
    fn invalid_merged_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOCAL_CONFIG_FILE), "[locks]\nheartbeat_interval_secs = 5000\n").unwrap();
        assert!(resolver(&dir).resolve().is_err());
    }
}
