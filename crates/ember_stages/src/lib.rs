//! # ember_stages
//!
//! Built-in provisioning stages and the registry composition used by the
//! `ember` binary.
//!
//! New stages are added by implementing `StageCreator` and registering the
//! creator in [`default_registry`].

pub mod files;

use std::sync::Arc;

use ember_core::{CoreResult, StageRegistry};
use tracing::debug;

pub use files::{FilesCreator, FilesStage};

/// Build the registry of every built-in stage.
///
/// Fails only if two built-in stages share a name.
pub fn default_registry() -> CoreResult<StageRegistry> {
    let mut registry = StageRegistry::new();
    registry.register(Arc::new(FilesCreator))?;
    debug!("Registered stages: {:?}", registry.names());
    Ok(registry)
}
