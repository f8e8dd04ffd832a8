//! [`TestWorkspace`]: a temp directory holding config, state and input files.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sync_core::{SharedStore, Snapshot, file_store};
use tempfile::TempDir;

/// Default state file name inside the workspace
pub const STATE_FILE: &str = "sync-state.json";

pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn state_path(&self) -> PathBuf {
        self.root().join(STATE_FILE)
    }

    /// A file store over the workspace state file
    pub fn store(&self) -> SharedStore {
        file_store(self.state_path()).unwrap()
    }

    /// Write `channel-sync.toml`
    pub fn write_config(&self, content: &str) {
        fs::write(self.root().join("channel-sync.toml"), content).unwrap();
    }

    /// Write a snapshot as JSON and return its path
    pub fn write_snapshot(&self, name: &str, snapshot: &Snapshot) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, serde_json::to_string_pretty(snapshot).unwrap()).unwrap();
        path
    }

    /// Parse the state file as raw JSON
    pub fn read_state(&self) -> Value {
        let content = fs::read_to_string(self.state_path())
            .unwrap_or_else(|_| panic!("Could not read state: {}", self.state_path().display()));
        serde_json::from_str(&content).unwrap()
    }
}
