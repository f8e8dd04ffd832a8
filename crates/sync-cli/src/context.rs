//! Working context detection
//!
//! Commands work from any subdirectory of a project: the project root is the
//! nearest ancestor holding `channel-sync.toml`, falling back to the current
//! directory.

use std::path::{Path, PathBuf};

use sync_core::config::CONFIG_FILE;
use sync_core::{ConfigResolver, SharedStore, SyncConfig, file_store};

use crate::error::Result;

/// Resolved configuration plus an open store
pub struct Context {
    pub config: SyncConfig,
    pub store: SharedStore,
}

impl Context {
    /// Resolve config from `cwd` (or load `config_path`), then open the store.
    ///
    /// `store_path` overrides the configured state file.
    pub fn load(cwd: &Path, config_path: Option<&Path>, store_path: Option<&Path>) -> Result<Self> {
        let root = detect_root(cwd);
        let mut config = match config_path {
            Some(path) => SyncConfig::load(path)?,
            None => ConfigResolver::new(&root).resolve()?,
        };

        if let Some(path) = store_path {
            config.store.path = cwd.join(path);
        } else if config.store.path.is_relative() {
            config.store.path = root.join(&config.store.path);
        }

        tracing::debug!(root = %root.display(), store = %config.store.path.display(), "Loaded context");
        let store = file_store(&config.store.path)?;
        Ok(Self { config, store })
    }
}

/// Nearest ancestor of `cwd` containing the config file, or `cwd` itself
pub fn detect_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .unwrap_or(cwd)
        .to_path_buf()
}
