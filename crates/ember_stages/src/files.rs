//! The `files` stage: directories, files and links under the target root.
//!
//! `apply` turns the `storage` section into a plan. `run` executes the
//! plan in a fixed order (directories, then files, then links) so that
//! files and links can rely on their parent directories existing.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::fs;

use ember_core::{
    Config, Fetcher, Named, SharedState, Stage, StageCreator, StageError, StageLogger,
    StageResult,
};

/// Registry key of this stage.
pub const NAME: &str = "files";

/// State entry holding the number of files written by the last run.
pub const WRITTEN_KEY: &str = "files.written";

/// One step of the plan built by `apply`.
#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Directory {
        path: PathBuf,
        mode: Option<u32>,
    },
    File {
        path: PathBuf,
        source: Option<String>,
        mode: Option<u32>,
        overwrite: bool,
    },
    Link {
        path: PathBuf,
        target: String,
        overwrite: bool,
    },
}

/// Creator for [`FilesStage`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesCreator;

impl Named for FilesCreator {
    fn name(&self) -> &str {
        NAME
    }
}

impl StageCreator for FilesCreator {
    fn create(
        &self,
        logger: StageLogger,
        root: &Path,
        fetcher: Arc<dyn Fetcher>,
        state: SharedState,
    ) -> Box<dyn Stage> {
        Box::new(FilesStage::new(logger, root, fetcher, state))
    }
}

/// Writes the `storage.directories`, `storage.files` and `storage.links`
/// entries of a config under a root directory.
pub struct FilesStage {
    logger: StageLogger,
    root: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    state: SharedState,
    plan: Option<Vec<Operation>>,
}

impl FilesStage {
    pub fn new(
        logger: StageLogger,
        root: &Path,
        fetcher: Arc<dyn Fetcher>,
        state: SharedState,
    ) -> Self {
        Self {
            logger,
            root: root.to_path_buf(),
            fetcher,
            state,
            plan: None,
        }
    }

    /// Number of operations in the applied plan, if `apply` succeeded.
    pub fn planned(&self) -> Option<usize> {
        self.plan.as_ref().map(Vec::len)
    }

    /// Map an absolute config path onto the root.
    fn resolve(&self, entry: &str, raw: &str) -> StageResult<PathBuf> {
        let path = Path::new(raw);
        if !path.is_absolute() {
            return Err(invalid(entry, "path must be absolute"));
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(invalid(entry, "path must not contain '..'"));
        }
        let relative = path.strip_prefix("/").unwrap_or(path);
        Ok(self.root.join(relative))
    }

    /// Decide whether an entry goes into the plan.
    fn admit(&self, entry: &str, unsupported: Option<String>, ignore: bool) -> StageResult<bool> {
        match unsupported {
            None => Ok(true),
            Some(reason) if ignore => {
                self.logger
                    .warn(format!("Skipping unsupported {}: {}", entry, reason));
                Ok(false)
            }
            Some(reason) => Err(StageError::Unsupported {
                entry: entry.to_string(),
                reason,
            }),
        }
    }

    async fn write_file(
        &self,
        path: &Path,
        source: Option<&str>,
        mode: Option<u32>,
        overwrite: bool,
    ) -> StageResult<()> {
        if fs::symlink_metadata(path).await.is_ok() && !overwrite {
            return Err(StageError::AlreadyExists(path.to_path_buf()));
        }
        let contents = match source {
            Some(source) => self.fetcher.fetch(source).await?,
            None => Vec::new(),
        };
        create_parent(path).await?;
        // Replace a link instead of writing through it, which could land
        // outside the root.
        if let Ok(meta) = fs::symlink_metadata(path).await {
            if meta.file_type().is_symlink() {
                fs::remove_file(path).await.map_err(StageError::io(path))?;
            }
        }
        fs::write(path, &contents)
            .await
            .map_err(StageError::io(path))?;
        if let Some(mode) = mode {
            set_mode(path, mode).await?;
        }
        self.logger
            .debug(format!("Wrote {} ({} bytes)", path.display(), contents.len()));
        Ok(())
    }

    async fn create_link(&self, path: &Path, target: &str, overwrite: bool) -> StageResult<()> {
        if fs::symlink_metadata(path).await.is_ok() {
            if !overwrite {
                return Err(StageError::AlreadyExists(path.to_path_buf()));
            }
            fs::remove_file(path).await.map_err(StageError::io(path))?;
        }
        create_parent(path).await?;
        symlink(target, path).await?;
        self.logger
            .debug(format!("Linked {} -> {}", path.display(), target));
        Ok(())
    }
}

impl Named for FilesStage {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl Stage for FilesStage {
    fn apply(&mut self, config: &Config, ignore_unsupported: bool) -> StageResult<()> {
        let storage = &config.storage;
        let mut plan = Vec::new();

        for dir in &storage.directories {
            let entry = format!("directory {}", dir.path);
            let path = self.resolve(&entry, &dir.path)?;
            if self.admit(&entry, unknown_keys(&dir.unsupported), ignore_unsupported)? {
                plan.push(Operation::Directory {
                    path,
                    mode: dir.mode,
                });
            }
        }

        for file in &storage.files {
            let entry = format!("file {}", file.path);
            let path = self.resolve(&entry, &file.path)?;
            let contents = file.contents.as_ref();
            let unsupported = unknown_keys(&file.unsupported).or_else(|| {
                contents
                    .and_then(|c| unknown_keys(&c.unsupported))
                    .map(|r| format!("contents: {}", r))
            });
            if self.admit(&entry, unsupported, ignore_unsupported)? {
                plan.push(Operation::File {
                    path,
                    source: contents.and_then(|c| c.source.clone()),
                    mode: file.mode,
                    overwrite: file.overwrite.unwrap_or(false),
                });
            }
        }

        for link in &storage.links {
            let entry = format!("link {}", link.path);
            let path = self.resolve(&entry, &link.path)?;
            if link.target.is_empty() {
                return Err(invalid(&entry, "target must not be empty"));
            }
            let unsupported = unknown_keys(&link.unsupported).or_else(|| {
                (link.hard == Some(true)).then(|| "hard links are not supported".to_string())
            });
            if self.admit(&entry, unsupported, ignore_unsupported)? {
                plan.push(Operation::Link {
                    path,
                    target: link.target.clone(),
                    overwrite: link.overwrite.unwrap_or(false),
                });
            }
        }

        self.logger.info(format!("{} operations planned", plan.len()));
        self.plan = Some(plan);
        Ok(())
    }

    async fn run(&mut self, config: &Config) -> StageResult<()> {
        let plan = self.plan.take().ok_or(StageError::NotApplied)?;
        self.logger.info(format!(
            "Provisioning {} entries under {} (config version {})",
            plan.len(),
            self.root.display(),
            config.version
        ));

        let mut written = 0u64;
        for op in &plan {
            match op {
                Operation::Directory { path, mode } => {
                    fs::create_dir_all(path)
                        .await
                        .map_err(StageError::io(path))?;
                    if let Some(mode) = mode {
                        set_mode(path, *mode).await?;
                    }
                }
                Operation::File {
                    path,
                    source,
                    mode,
                    overwrite,
                } => {
                    self.write_file(path, source.as_deref(), *mode, *overwrite)
                        .await?;
                    written += 1;
                }
                Operation::Link {
                    path,
                    target,
                    overwrite,
                } => self.create_link(path, target, *overwrite).await?,
            }
        }

        self.state.write().await.put(WRITTEN_KEY, json!(written));
        Ok(())
    }
}

fn invalid(entry: &str, reason: &str) -> StageError {
    StageError::Invalid {
        entry: entry.to_string(),
        reason: reason.to_string(),
    }
}

fn unknown_keys(keys: &BTreeMap<String, Value>) -> Option<String> {
    if keys.is_empty() {
        return None;
    }
    let names: Vec<&str> = keys.keys().map(String::as_str).collect();
    Some(format!("unknown keys: {}", names.join(", ")))
}

async fn create_parent(path: &Path) -> StageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(StageError::io(parent))?;
    }
    Ok(())
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> StageResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(StageError::io(path))
}

#[cfg(not(unix))]
async fn set_mode(path: &Path, _mode: u32) -> StageResult<()> {
    Err(StageError::Failed(format!(
        "cannot set mode on {}: not a unix host",
        path.display()
    )))
}

#[cfg(unix)]
async fn symlink(target: &str, path: &Path) -> StageResult<()> {
    fs::symlink(target, path)
        .await
        .map_err(StageError::io(path))
}

#[cfg(not(unix))]
async fn symlink(_target: &str, path: &Path) -> StageResult<()> {
    Err(StageError::Failed(format!(
        "cannot link {}: not a unix host",
        path.display()
    )))
}
