//! Name-keyed registries for pluggable components.
//!
//! A [`Registry`] is filled once at startup and then shared read-only,
//! typically behind an `Arc`. Each registry carries a domain label
//! ("stages", ...) that shows up in diagnostics so that several
//! registries in the same process can be told apart.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{CoreError, CoreResult};
use crate::stage::StageCreator;

/// Domain label of the stage registry.
pub const STAGES_DOMAIN: &str = "stages";

/// Anything that can be stored in a [`Registry`].
pub trait Named {
    /// Stable identifier; doubles as the registry key.
    fn name(&self) -> &str;
}

/// A registry of named items.
///
/// Keys are unique. Registering a second item under an existing name is
/// rejected and the first item is kept.
pub struct Registry<T: ?Sized> {
    domain: String,
    items: BTreeMap<String, Arc<T>>,
}

impl<T: ?Sized + Named> Registry<T> {
    /// Create a new empty registry for the given domain.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            items: BTreeMap::new(),
        }
    }

    /// The domain label this registry was created with.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Register an item under its `name()`.
    pub fn register(&mut self, item: Arc<T>) -> CoreResult<()> {
        match self.items.entry(item.name().to_string()) {
            Entry::Occupied(existing) => {
                error!(domain = %self.domain, "Duplicate registration: {}", existing.key());
                Err(CoreError::DuplicateRegistration {
                    domain: self.domain.clone(),
                    name: existing.key().clone(),
                })
            }
            Entry::Vacant(slot) => {
                debug!(domain = %self.domain, "Registering: {}", slot.key());
                slot.insert(item);
                Ok(())
            }
        }
    }

    /// Get an item by name.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.items.get(name).cloned()
    }

    /// Check if an item is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("domain", &self.domain)
            .field("items", &self.items.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A registry that accepts registrations through a shared reference.
///
/// Registrations are serialized behind a mutex, so the duplicate check and
/// the insert happen atomically. Call [`SharedRegistry::freeze`] once
/// registration is over to get a plain read-only [`Registry`].
pub struct SharedRegistry<T: ?Sized> {
    inner: Mutex<Registry<T>>,
}

impl<T: ?Sized + Named> SharedRegistry<T> {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Registry::new(domain)),
        }
    }

    pub fn register(&self, item: Arc<T>) -> CoreResult<()> {
        self.inner.lock().register(item)
    }

    /// Stop accepting registrations.
    pub fn freeze(self) -> Registry<T> {
        self.inner.into_inner()
    }
}

/// The registry of stage creators.
///
/// Thin facade over `Registry<dyn StageCreator>` fixed to the
/// [`STAGES_DOMAIN`] label.
#[derive(Debug)]
pub struct StageRegistry {
    creators: Registry<dyn StageCreator>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    pub fn new() -> Self {
        Self {
            creators: Registry::new(STAGES_DOMAIN),
        }
    }

    pub fn domain(&self) -> &str {
        self.creators.domain()
    }

    /// Register a stage creator under its `name()`.
    pub fn register(&mut self, creator: Arc<dyn StageCreator>) -> CoreResult<()> {
        self.creators.register(creator)
    }

    /// Look up a stage creator by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StageCreator>> {
        self.creators.get(name)
    }

    /// Look up a stage creator, failing with [`CoreError::UnknownStage`].
    pub fn get_required(&self, name: &str) -> CoreResult<Arc<dyn StageCreator>> {
        self.get(name).ok_or_else(|| CoreError::UnknownStage {
            name: name.to_string(),
            known: self.names(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains(name)
    }

    /// All registered stage names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.creators.names()
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}
