//! Stage and stage creator contracts.
//!
//! A stage is one phase of boot-time provisioning ("create partitions",
//! "write files", ...). Stages are never registered directly: the
//! [`StageRegistry`](crate::registry::StageRegistry) stores a
//! [`StageCreator`] per stage name, and the executor asks it for a fresh
//! [`Stage`] on every orchestration pass.
//!
//! # Stage Lifecycle
//!
//! 1. **Create**: `StageCreator::create` wires the logger, root path,
//!    fetcher and shared state into a new stage. No I/O happens here.
//! 2. **Apply**: `Stage::apply` checks the configuration and records what
//!    the stage is going to do. Nothing irreversible happens yet.
//! 3. **Run**: `Stage::run` performs the side effects.
//! 4. The stage is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use ember_core::{Config, Fetcher, Named, SharedState, Stage, StageCreator, StageLogger, StageResult};
//!
//! struct HostnameCreator;
//!
//! impl Named for HostnameCreator {
//!     fn name(&self) -> &str { "hostname" }
//! }
//!
//! impl StageCreator for HostnameCreator {
//!     fn create(&self, logger: StageLogger, root: &Path, _f: Arc<dyn Fetcher>, _s: SharedState) -> Box<dyn Stage> {
//!         Box::new(HostnameStage { logger, root: root.to_path_buf() })
//!     }
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::StageResult;
use crate::fetcher::Fetcher;
use crate::logger::StageLogger;
use crate::registry::Named;
use crate::state::SharedState;

/// Where a stage instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Constructed by its creator
    Created,
    /// Configuration accepted
    Applied,
    /// Run finished successfully
    Done,
    /// Apply or run returned an error
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Created => "created",
            StageStatus::Applied => "applied",
            StageStatus::Done => "done",
            StageStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// An instantiated, single-use provisioning stage.
///
/// `name()` must match the creator that produced the stage.
#[async_trait]
pub trait Stage: Named + Send {
    /// Validate the part of `config` this stage is responsible for.
    ///
    /// Entries the stage does not understand are an error unless
    /// `ignore_unsupported` is set, in which case they are logged as
    /// warnings and left out of the run. Invalid entries are always an
    /// error.
    fn apply(&mut self, config: &Config, ignore_unsupported: bool) -> StageResult<()>;

    /// Perform the stage's side effects for the applied configuration.
    async fn run(&mut self, config: &Config) -> StageResult<()>;
}

/// Factory for a [`Stage`], stored in the stage registry.
///
/// `name()` must be constant and equal to the key the creator is
/// registered under.
pub trait StageCreator: Named + Send + Sync {
    /// Build a new stage rooted at `root`.
    ///
    /// Must not touch the filesystem or look at any configuration.
    fn create(
        &self,
        logger: StageLogger,
        root: &Path,
        fetcher: Arc<dyn Fetcher>,
        state: SharedState,
    ) -> Box<dyn Stage>;
}
