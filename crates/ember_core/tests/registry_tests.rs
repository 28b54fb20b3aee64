//! Integration tests for the stage registry.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ember_core::{
    Config, CoreError, Fetcher, Named, SharedState, Stage, StageCreator, StageLogger,
    StageRegistry, StageResult, STAGES_DOMAIN,
};

struct NoopStage {
    name: String,
}

impl Named for NoopStage {
    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Stage for NoopStage {
    fn apply(&mut self, _config: &Config, _ignore_unsupported: bool) -> StageResult<()> {
        Ok(())
    }

    async fn run(&mut self, _config: &Config) -> StageResult<()> {
        Ok(())
    }
}

struct NoopCreator {
    name: &'static str,
}

impl Named for NoopCreator {
    fn name(&self) -> &str {
        self.name
    }
}

impl StageCreator for NoopCreator {
    fn create(
        &self,
        _logger: StageLogger,
        _root: &Path,
        _fetcher: Arc<dyn Fetcher>,
        _state: SharedState,
    ) -> Box<dyn Stage> {
        Box::new(NoopStage {
            name: self.name.to_string(),
        })
    }
}

fn creator(name: &'static str) -> Arc<NoopCreator> {
    Arc::new(NoopCreator { name })
}

/// Register creators named disks, files and mount into a fresh registry.
#[test]
fn test_scenario_register_and_lookup() {
    let mut registry = StageRegistry::new();
    assert_eq!(registry.domain(), STAGES_DOMAIN);

    let files = creator("files");
    registry.register(creator("disks")).unwrap();
    registry.register(files.clone()).unwrap();
    registry.register(creator("mount")).unwrap();

    assert_eq!(registry.names(), vec!["disks", "files", "mount"]);

    let found = registry.get("files").unwrap();
    assert_eq!(found.name(), "files");
    let expected: Arc<dyn StageCreator> = files;
    assert!(Arc::ptr_eq(&found, &expected));
}

#[test]
fn test_every_registered_creator_is_found_by_name() {
    let names = ["disks", "fetch", "files", "kargs", "mount", "umount"];
    let mut registry = StageRegistry::new();
    for name in names {
        registry.register(creator(name)).unwrap();
    }

    for name in names {
        let found = registry.get(name).unwrap();
        assert_eq!(found.name(), name);
    }
    assert_eq!(registry.len(), names.len());
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = StageRegistry::new();
    let first = creator("files");
    registry.register(first.clone()).unwrap();

    let err = registry.register(creator("files")).unwrap_err();
    assert!(matches!(
        &err,
        CoreError::DuplicateRegistration { domain, name } if domain == "stages" && name == "files"
    ));
    assert!(err.to_string().contains("stages"));

    let kept = registry.get("files").unwrap();
    let first: Arc<dyn StageCreator> = first;
    assert!(Arc::ptr_eq(&kept, &first));
    assert_eq!(registry.names(), vec!["files"]);
}

#[test]
fn test_unregistered_name_is_not_found() {
    let empty = StageRegistry::new();
    assert!(empty.get("unregistered-name").is_none());

    let mut registry = StageRegistry::new();
    registry.register(creator("disks")).unwrap();
    registry.register(creator("files")).unwrap();
    assert!(registry.get("unregistered-name").is_none());
    assert!(!registry.contains("unregistered-name"));

    let err = registry.get_required("unregistered-name").err().unwrap();
    match err {
        CoreError::UnknownStage { name, known } => {
            assert_eq!(name, "unregistered-name");
            assert_eq!(known, vec!["disks", "files"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_created_stage_matches_creator_name() {
    let mut registry = StageRegistry::new();
    registry.register(creator("disks")).unwrap();
    let found = registry.get("disks").unwrap();
    let stage = found.create(
        StageLogger::new(STAGES_DOMAIN, "disks"),
        Path::new("/sysroot"),
        Arc::new(ember_core::MockFetcher::new()),
        ember_core::ProvisionState::new().into_shared(),
    );
    assert_eq!(stage.name(), found.name());
}
