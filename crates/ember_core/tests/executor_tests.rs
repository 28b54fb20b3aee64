//! Integration tests for the stage executor.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use ember_core::{
    Config, CoreError, ExecutionLog, ExecutionState, ExecutorOptions, Fetcher, MockFetcher,
    Named, ProvisionState, SharedState, Stage, StageCreator, StageError, StageExecutor,
    StageLogger, StageRegistry, StageResult, StageStatus,
};

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Succeed,
    RejectConfig,
    FailRun,
    WarnAndSucceed,
}

struct ScriptedStage {
    name: String,
    behavior: Behavior,
    logger: StageLogger,
    journal: Journal,
}

impl Named for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn apply(&mut self, _config: &Config, ignore_unsupported: bool) -> StageResult<()> {
        self.journal.lock().unwrap().push(format!("apply:{}", self.name));
        match self.behavior {
            Behavior::RejectConfig => Err(StageError::Unsupported {
                entry: "file /etc/motd".to_string(),
                reason: "unknown key 'append'".to_string(),
            }),
            Behavior::WarnAndSucceed if ignore_unsupported => {
                self.logger.warn("skipping file /etc/motd");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn run(&mut self, _config: &Config) -> StageResult<()> {
        self.journal.lock().unwrap().push(format!("run:{}", self.name));
        if self.behavior == Behavior::FailRun {
            return Err(StageError::Failed("device busy".to_string()));
        }
        Ok(())
    }
}

struct ScriptedCreator {
    name: &'static str,
    /// Name the created stage reports
    stage_name: &'static str,
    behavior: Behavior,
    journal: Journal,
}

impl Named for ScriptedCreator {
    fn name(&self) -> &str {
        self.name
    }
}

impl StageCreator for ScriptedCreator {
    fn create(
        &self,
        logger: StageLogger,
        _root: &Path,
        _fetcher: Arc<dyn Fetcher>,
        _state: SharedState,
    ) -> Box<dyn Stage> {
        self.journal.lock().unwrap().push(format!("create:{}", self.name));
        Box::new(ScriptedStage {
            name: self.stage_name.to_string(),
            behavior: self.behavior,
            logger,
            journal: Arc::clone(&self.journal),
        })
    }
}

struct Harness {
    registry: StageRegistry,
    journal: Journal,
}

impl Harness {
    fn new() -> Self {
        Self {
            registry: StageRegistry::new(),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn stage(mut self, name: &'static str, behavior: Behavior) -> Self {
        self.registry
            .register(Arc::new(ScriptedCreator {
                name,
                stage_name: name,
                behavior,
                journal: Arc::clone(&self.journal),
            }))
            .unwrap();
        self
    }

    fn misnamed_stage(mut self, name: &'static str, stage_name: &'static str) -> Self {
        self.registry
            .register(Arc::new(ScriptedCreator {
                name,
                stage_name,
                behavior: Behavior::Succeed,
                journal: Arc::clone(&self.journal),
            }))
            .unwrap();
        self
    }

    fn executor(self, options: ExecutorOptions) -> (StageExecutor, Journal) {
        let executor = StageExecutor::new(
            Arc::new(self.registry),
            Arc::new(MockFetcher::new()),
            ProvisionState::new().into_shared(),
            options,
        );
        (executor, self.journal)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn journal(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[tokio::test]
async fn test_stages_run_in_order() {
    let (executor, log_journal) = Harness::new()
        .stage("disks", Behavior::Succeed)
        .stage("files", Behavior::Succeed)
        .executor(ExecutorOptions::default());

    let log = executor
        .execute(&names(&["disks", "files"]), &Config::default())
        .await
        .unwrap();

    assert_eq!(log.state, ExecutionState::Completed);
    assert_eq!(log.completed_stages(), vec!["disks", "files"]);
    assert_eq!(
        journal(&log_journal),
        vec!["create:disks", "apply:disks", "run:disks", "create:files", "apply:files", "run:files"]
    );

    let state = executor.state().read().await;
    assert_eq!(state.completed_stages, vec!["disks", "files"]);
}

#[tokio::test]
async fn test_run_failure_stops_later_stages() {
    let (executor, log_journal) = Harness::new()
        .stage("disks", Behavior::Succeed)
        .stage("files", Behavior::FailRun)
        .stage("mount", Behavior::Succeed)
        .executor(ExecutorOptions::default());

    let err = executor
        .execute(&names(&["disks", "files", "mount"]), &Config::default())
        .await
        .unwrap_err();

    match &err {
        CoreError::RunFailed { stage, source } => {
            assert_eq!(stage, "files");
            assert!(matches!(source, StageError::Failed(msg) if msg == "device busy"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let entries = journal(&log_journal);
    assert!(entries.contains(&"run:files".to_string()));
    assert!(!entries.iter().any(|e| e.ends_with(":mount")));

    let state = executor.state().read().await;
    assert_eq!(state.completed_stages, vec!["disks"]);
}

#[tokio::test]
async fn test_apply_failure_skips_run() {
    let (executor, log_journal) = Harness::new()
        .stage("files", Behavior::RejectConfig)
        .stage("mount", Behavior::Succeed)
        .executor(ExecutorOptions::default());

    let err = executor
        .execute(&names(&["files", "mount"]), &Config::default())
        .await
        .unwrap_err();

    assert!(matches!(&err, CoreError::ApplyFailed { stage, .. } if stage == "files"));
    assert!(err.to_string().contains("append"));
    assert_eq!(journal(&log_journal), vec!["create:files", "apply:files"]);
}

#[tokio::test]
async fn test_unknown_stage_runs_nothing() {
    let (executor, log_journal) = Harness::new()
        .stage("disks", Behavior::Succeed)
        .executor(ExecutorOptions::default());

    let err = executor
        .execute(&names(&["disks", "networkd"]), &Config::default())
        .await
        .unwrap_err();

    assert!(matches!(&err, CoreError::UnknownStage { name, .. } if name == "networkd"));
    assert!(journal(&log_journal).is_empty());
}

#[tokio::test]
async fn test_stage_name_mismatch_is_reported() {
    let (executor, log_journal) = Harness::new()
        .misnamed_stage("files", "file")
        .executor(ExecutorOptions::default());

    let err = executor
        .execute(&names(&["files"]), &Config::default())
        .await
        .unwrap_err();

    match err {
        CoreError::StageNameMismatch { expected, actual } => {
            assert_eq!(expected, "files");
            assert_eq!(actual, "file");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(journal(&log_journal), vec!["create:files"]);
}

#[tokio::test]
async fn test_warnings_recorded_when_ignoring_unsupported() {
    let (executor, _) = Harness::new()
        .stage("files", Behavior::WarnAndSucceed)
        .executor(ExecutorOptions::default().ignore_unsupported(true));

    let log = executor
        .execute(&names(&["files"]), &Config::default())
        .await
        .unwrap();

    assert_eq!(log.records.len(), 1);
    assert_eq!(log.records[0].warnings, 1);
    assert_eq!(log.records[0].status, StageStatus::Done);
}

#[tokio::test]
async fn test_failed_pass_is_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("ember").join("log.json");

    let (executor, _) = Harness::new()
        .stage("disks", Behavior::Succeed)
        .stage("files", Behavior::FailRun)
        .executor(ExecutorOptions::new(temp_dir.path()).log_path(&log_path));

    let result = executor
        .execute(&names(&["disks", "files"]), &Config::default())
        .await;
    assert!(result.is_err());

    let log = ExecutionLog::load(&log_path).unwrap();
    assert_eq!(log.state, ExecutionState::Failed);
    assert_eq!(log.failed_stage(), Some("files"));
    assert_eq!(log.completed_stages(), vec!["disks"]);
    assert!(log.error.unwrap().contains("device busy"));
    assert_eq!(log.records[1].status, StageStatus::Failed);
}

#[tokio::test]
async fn test_stage_error_survives_unwritable_log() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();

    let (executor, _) = Harness::new()
        .stage("files", Behavior::FailRun)
        .executor(ExecutorOptions::new(temp_dir.path()).log_path(blocker.join("log.json")));

    let err = executor
        .execute(&names(&["files"]), &Config::default())
        .await
        .unwrap_err();

    assert!(matches!(&err, CoreError::RunFailed { stage, .. } if stage == "files"));
    assert_eq!(err.stage(), Some("files"));
}
