//! Provisioning configuration document.
//!
//! The document is parsed once and handed to every stage as-is. Each
//! entry keeps the keys it does not recognise in an `unsupported` map so
//! that stages can decide whether to reject or skip it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Major config version this build understands.
pub const SUPPORTED_MAJOR_VERSION: &str = "3";

/// On-disk encoding of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick a format from a file extension. Anything not YAML is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub storage: Storage,
    /// Sections owned by stages this build does not know about
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl Config {
    /// Parse a document from text.
    pub fn parse(text: &str, format: ConfigFormat) -> CoreResult<Self> {
        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(text)
                .map_err(|e| CoreError::InvalidConfig(e.to_string()))?,
            ConfigFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| CoreError::InvalidConfig(e.to_string()))?,
        };
        if !config.other.is_empty() {
            debug!(
                "Config carries sections handled elsewhere: {:?}",
                config.other.keys().collect::<Vec<_>>()
            );
        }
        Ok(config)
    }

    /// Load and parse a document from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, ConfigFormat::from_path(path))
    }

    /// Reject documents whose major version this build does not speak.
    pub fn check_version(&self) -> CoreResult<()> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major == SUPPORTED_MAJOR_VERSION {
            Ok(())
        } else {
            Err(CoreError::UnsupportedVersion(self.version.clone()))
        }
    }
}

/// The `storage` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<DirectoryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkEntry>,
    /// Storage subsections for other stages (disks, filesystems, ...)
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// A directory to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, Value>,
}

/// A file to write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Resource>,
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, Value>,
}

/// A link to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub path: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, Value>,
}

/// Reference to content the fetcher resolves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, Value>,
}
