//! Cross-stage state persisted between stage invocations.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Handle passed to every stage creator.
pub type SharedState = Arc<RwLock<ProvisionState>>;

/// State shared by all stages of a boot.
///
/// Stages run in separate process invocations, so the state is loaded
/// from and saved to a JSON file around each run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionState {
    /// Free-form values stages leave for each other
    #[serde(default)]
    pub entries: BTreeMap<String, Value>,
    /// Stages that ran to completion, in order
    #[serde(default)]
    pub completed_stages: Vec<String>,
}

impl ProvisionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load state from disk. A missing file yields empty state.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            debug!("No state file at {:?}, starting fresh", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Save state to disk.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        debug!("Saved state to {:?}", path);
        Ok(())
    }

    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn mark_completed(&mut self, stage: impl Into<String>) {
        self.completed_stages.push(stage.into());
    }

    pub fn is_completed(&self, stage: &str) -> bool {
        self.completed_stages.iter().any(|s| s == stage)
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }
}
