//! Shared fixtures for the engine integration suites

#![allow(dead_code)]

use async_trait::async_trait;
use dom_adapter::{DomBridge, DomError, ElementHandle, Locator, MemoryDom};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use workflow_engine::{
    EngineConfig, EngineError, ExecutionObserver, ExecutionStats, LogEntry, WorkflowEngine,
};

/// Captures every observer callback for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub logs: Mutex<Vec<LogEntry>>,
    pub progress: Mutex<Vec<ExecutionStats>>,
    pub completed: Mutex<Vec<ExecutionStats>>,
    pub errors: Mutex<Vec<EngineError>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.logs.lock().iter().map(|e| e.message.clone()).collect()
    }

    pub fn has_message_containing(&self, needle: &str) -> bool {
        self.logs.lock().iter().any(|e| e.message.contains(needle))
    }

    pub fn completed_count(&self) -> usize {
        self.completed.lock().len()
    }

    pub fn first_error(&self) -> Option<EngineError> {
        self.errors.lock().first().cloned()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_progress(&self, stats: &ExecutionStats) {
        self.progress.lock().push(stats.clone());
    }

    fn on_log(&self, entry: &LogEntry) {
        self.logs.lock().push(entry.clone());
    }

    fn on_complete(&self, stats: &ExecutionStats) {
        self.completed.lock().push(stats.clone());
    }

    fn on_error(&self, error: &EngineError) {
        self.errors.lock().push(error.clone());
    }
}

/// Configuration with no settle delays and tight sleep slices, so suites run
/// in milliseconds.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        settle_delay_ms: 0,
        wait_slice_ms: 10,
        pause_aware_post_delay: false,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Engine wired to a [`MemoryDom`] with a recording observer.
pub fn engine_on(dom: MemoryDom) -> (Arc<WorkflowEngine>, Arc<RecordingObserver>) {
    init_tracing();
    let observer = RecordingObserver::new();
    let engine = Arc::new(
        WorkflowEngine::new(Arc::new(dom))
            .with_observer(observer.clone())
            .with_config(fast_config()),
    );
    (engine, observer)
}

/// Delegating bridge that fails clicks on designated elements, for
/// error-policy tests.
pub struct FailingClicks {
    inner: MemoryDom,
    fail_labels: HashSet<String>,
}

impl FailingClicks {
    pub fn new(inner: MemoryDom, fail_labels: &[&str]) -> Self {
        Self {
            inner,
            fail_labels: fail_labels.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl DomBridge for FailingClicks {
    async fn resolve_one(&self, locator: &Locator) -> Result<ElementHandle, DomError> {
        self.inner.resolve_one(locator).await
    }

    async fn resolve_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, DomError> {
        self.inner.resolve_all(locator).await
    }

    async fn query_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DomError> {
        self.inner.query_within(parent, selector).await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), DomError> {
        if self.fail_labels.contains(&element.label) {
            return Err(DomError::Backend(format!(
                "injected click failure on {element}"
            )));
        }
        self.inner.click(element).await
    }

    async fn set_value(
        &self,
        element: &ElementHandle,
        text: &str,
        clear_first: bool,
    ) -> Result<(), DomError> {
        self.inner.set_value(element, text, clear_first).await
    }

    async fn set_checked(&self, element: &ElementHandle, checked: bool) -> Result<(), DomError> {
        self.inner.set_checked(element, checked).await
    }

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool, DomError> {
        self.inner.is_checked(element).await
    }

    async fn select_option(&self, element: &ElementHandle, value: &str) -> Result<(), DomError> {
        self.inner.select_option(element, value).await
    }

    async fn dispatch_hover(&self, element: &ElementHandle) -> Result<(), DomError> {
        self.inner.dispatch_hover(element).await
    }

    async fn dispatch_focus(&self, element: &ElementHandle) -> Result<(), DomError> {
        self.inner.dispatch_focus(element).await
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DomError> {
        self.inner.scroll_into_view(element).await
    }
}
