//! Mock fetcher for testing.
//!
//! Serves predefined bodies per source and captures every request so that
//! stage tests can run without touching the network or the host
//! filesystem.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{FetchError, FetchResult};
use crate::fetcher::Fetcher;

/// Mock fetcher for testing.
#[derive(Clone, Default)]
pub struct MockFetcher {
    /// Bodies served per source.
    responses: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// Sources requested, in order.
    captured: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `source`.
    pub fn with_source(self, source: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.responses.write().insert(source.into(), body.into());
        self
    }

    /// Sources requested so far.
    pub fn captured(&self) -> Vec<String> {
        self.captured.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, source: &str) -> FetchResult<Vec<u8>> {
        self.captured.write().push(source.to_string());
        self.responses
            .read()
            .get(source)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(source.to_string()))
    }
}
