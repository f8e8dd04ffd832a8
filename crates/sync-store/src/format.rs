//! Document encodings selected by file extension

use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result};

/// On-disk encoding of a [`crate::FileStore`] document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
    Yaml,
}

impl Format {
    /// Detect the format from a path's extension.
    ///
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    pub(crate) fn decode<D: DeserializeOwned>(self, path: &Path, content: &str) -> Result<D> {
        let parsed = match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::Parse {
            path: path.to_path_buf(),
            format: self.name().into(),
            message,
        })
    }

    pub(crate) fn encode<D: Serialize>(self, path: &Path, doc: &D) -> Result<String> {
        let encoded = match self {
            Self::Toml => toml::to_string_pretty(doc).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(doc).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(doc).map_err(|e| e.to_string()),
        };
        encoded.map_err(|message| Error::Serialize {
            path: path.to_path_buf(),
            format: self.name().into(),
            message,
        })
    }
}
