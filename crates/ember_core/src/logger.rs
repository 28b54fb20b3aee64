//! Per-stage logger handed to stage creators.

use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::Span;

/// Logger scoped to one stage.
///
/// Events are emitted through `tracing` inside a `stage` span carrying the
/// registry domain and the stage name. Warnings are counted so the
/// executor can report how many entries a stage skipped.
#[derive(Debug, Clone)]
pub struct StageLogger {
    span: Span,
    warnings: Arc<AtomicUsize>,
}

impl StageLogger {
    pub fn new(domain: &str, stage: &str) -> Self {
        Self {
            span: tracing::info_span!("stage", domain = %domain, stage = %stage),
            warnings: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: impl Display) {
        tracing::debug!(parent: &self.span, "{}", message);
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(parent: &self.span, "{}", message);
    }

    pub fn warn(&self, message: impl Display) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(parent: &self.span, "{}", message);
    }

    pub fn error(&self, message: impl Display) {
        tracing::error!(parent: &self.span, "{}", message);
    }

    /// Number of warnings logged so far, across all clones.
    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }
}
