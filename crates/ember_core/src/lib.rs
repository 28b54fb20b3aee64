//! # ember_core
//!
//! Stage registry and stage execution contract for ember, a boot-time
//! provisioning tool.
//!
//! # Architecture
//!
//! - **Registry**: Maps stage names to stage creators, rejecting duplicates
//! - **Stages**: `StageCreator` builds a `Stage`; the stage applies then runs
//! - **Executor**: Runs a list of stages in order, aborting on the first failure
//! - **Collaborators**: Config document, per-stage logger, resource fetcher
//!   and cross-stage state handed to every stage
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ember_core::{
//!     Config, DefaultFetcher, ExecutorOptions, FetcherOptions, ProvisionState,
//!     StageExecutor, StageRegistry,
//! };
//!
//! // Compose the registry at startup
//! let mut registry = StageRegistry::new();
//! registry.register(Arc::new(MyFilesCreator))?;
//!
//! // Create executor
//! let executor = StageExecutor::new(
//!     Arc::new(registry),
//!     Arc::new(DefaultFetcher::new(FetcherOptions::default())?),
//!     ProvisionState::new().into_shared(),
//!     ExecutorOptions::new("/sysroot"),
//! );
//!
//! // Execute
//! let config = Config::load(path)?;
//! let log = executor.execute(&["files".to_string()], &config).await?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod logger;
pub mod mock;
pub mod registry;
pub mod stage;
pub mod state;

// Re-export main types for convenience
pub use config::{
    Config, ConfigFormat, DirectoryEntry, FileEntry, LinkEntry, Resource, Storage,
    SUPPORTED_MAJOR_VERSION,
};
pub use error::{CoreError, CoreResult, FetchError, FetchResult, StageError, StageResult};
pub use executor::{ExecutionLog, ExecutionState, ExecutorOptions, StageExecutor, StageRecord};
pub use fetcher::{DefaultFetcher, Fetcher, FetcherOptions};
pub use logger::StageLogger;
pub use mock::MockFetcher;
pub use registry::{Named, Registry, SharedRegistry, StageRegistry, STAGES_DOMAIN};
pub use stage::{Stage, StageCreator, StageStatus};
pub use state::{ProvisionState, SharedState};
