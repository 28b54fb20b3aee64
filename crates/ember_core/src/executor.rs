//! Stage executor with execution log persistence.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::fetcher::Fetcher;
use crate::logger::StageLogger;
use crate::registry::StageRegistry;
use crate::stage::{StageCreator, StageStatus};
use crate::state::SharedState;

/// State of an orchestration pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Nothing has run yet
    #[default]
    Pending,
    /// Stages are running
    Running,
    /// Every stage finished
    Completed,
    /// A stage failed and the pass was aborted
    Failed,
}

/// What happened to one stage during a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    /// Warnings the stage logged (skipped entries and the like)
    pub warnings: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Created,
            warnings: 0,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Log of one orchestration pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub run_id: Uuid,
    pub state: ExecutionState,
    /// Stages requested, in order
    pub stages: Vec<String>,
    /// One record per stage that was started
    pub records: Vec<StageRecord>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionLog {
    pub fn new(stages: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: ExecutionState::Pending,
            stages,
            records: Vec::new(),
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Save the log to disk.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        debug!("Saved execution log to {:?}", path);
        Ok(())
    }

    /// Load a log from disk.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Name of the stage that failed, if the pass failed in a stage.
    pub fn failed_stage(&self) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.status == StageStatus::Failed)
            .map(|r| r.name.as_str())
    }

    /// Names of the stages that finished.
    pub fn completed_stages(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status == StageStatus::Done)
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Options for a [`StageExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Root of the filesystem being provisioned
    pub root: PathBuf,
    /// Skip configuration entries a stage does not support
    pub ignore_unsupported: bool,
    /// Where to persist the execution log, if anywhere
    pub log_path: Option<PathBuf>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            ignore_unsupported: false,
            log_path: None,
        }
    }
}

impl ExecutorOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn ignore_unsupported(mut self, ignore: bool) -> Self {
        self.ignore_unsupported = ignore;
        self
    }

    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }
}

/// Runs stages from a registry, one after another.
pub struct StageExecutor {
    registry: Arc<StageRegistry>,
    fetcher: Arc<dyn Fetcher>,
    state: SharedState,
    options: ExecutorOptions,
}

impl StageExecutor {
    pub fn new(
        registry: Arc<StageRegistry>,
        fetcher: Arc<dyn Fetcher>,
        state: SharedState,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            registry,
            fetcher,
            state,
            options,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Execute the named stages in order.
    ///
    /// Every name is resolved before anything runs, so an unknown stage
    /// aborts the pass without side effects. After that each stage is
    /// created, applied and run; the first failure stops the pass and no
    /// later stage is created.
    pub async fn execute(&self, stages: &[String], config: &Config) -> CoreResult<ExecutionLog> {
        let creators = stages
            .iter()
            .map(|name| self.registry.get_required(name))
            .collect::<CoreResult<Vec<_>>>()?;

        let mut log = ExecutionLog::new(stages.to_vec());
        log.state = ExecutionState::Running;
        log.started_at = Some(Utc::now());

        info!("Starting provisioning pass {} ({} stages)", log.run_id, stages.len());

        for (i, creator) in creators.iter().enumerate() {
            info!("Running stage [{}/{}]: {}", i + 1, creators.len(), creator.name());

            if let Err(e) = self.run_stage(creator.as_ref(), config, &mut log).await {
                log.state = ExecutionState::Failed;
                log.error = Some(e.to_string());
                log.completed_at = Some(Utc::now());
                // Best effort; the stage error takes precedence.
                if let Err(save_err) = self.persist(&log) {
                    warn!("Could not save execution log: {}", save_err);
                }
                return Err(e);
            }
            self.persist(&log)?;
        }

        log.state = ExecutionState::Completed;
        log.completed_at = Some(Utc::now());
        self.persist(&log)?;

        info!("Provisioning pass {} completed", log.run_id);
        Ok(log)
    }

    /// Create, apply and run a single stage, recording the outcome.
    async fn run_stage(
        &self,
        creator: &dyn StageCreator,
        config: &Config,
        log: &mut ExecutionLog,
    ) -> CoreResult<()> {
        let name = creator.name().to_string();
        let logger = StageLogger::new(self.registry.domain(), &name);
        let mut record = StageRecord::new(&name);

        let mut stage = creator.create(
            logger.clone(),
            &self.options.root,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.state),
        );

        let outcome = if stage.name() != name {
            Err(CoreError::StageNameMismatch {
                expected: name.clone(),
                actual: stage.name().to_string(),
            })
        } else {
            match stage.apply(config, self.options.ignore_unsupported) {
                Err(source) => Err(CoreError::ApplyFailed {
                    stage: name.clone(),
                    source,
                }),
                Ok(()) => {
                    record.status = StageStatus::Applied;
                    debug!("Stage '{}' applied", name);
                    stage
                        .run(config)
                        .instrument(logger.span().clone())
                        .await
                        .map_err(|source| CoreError::RunFailed {
                            stage: name.clone(),
                            source,
                        })
                }
            }
        };

        record.warnings = logger.warnings();
        record.completed_at = Some(Utc::now());
        match &outcome {
            Ok(()) => {
                record.status = StageStatus::Done;
                self.state.write().await.mark_completed(&name);
                info!("Stage '{}' completed successfully", name);
            }
            Err(e) => {
                logger.error(e);
                record.status = StageStatus::Failed;
                record.error = Some(e.to_string());
            }
        }
        log.records.push(record);
        outcome
    }

    fn persist(&self, log: &ExecutionLog) -> CoreResult<()> {
        match &self.options.log_path {
            Some(path) => log.save(path),
            None => Ok(()),
        }
    }
}
