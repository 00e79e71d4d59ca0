use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, trace};

use crate::core::installer::InstallState;

/// Snapshot pushed to subscribers whenever progress changes.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub state: InstallState,
    pub step: String,
    pub current_file: Option<String>,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

/// Push-only progress subscriber.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Logs step changes at debug level and byte updates at trace level.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: ProgressEvent) {
        match &event.current_file {
            Some(file) => trace!(
                "[{}] {} {}/{} bytes",
                event.step,
                file,
                event.bytes_downloaded,
                event.bytes_total
            ),
            None => debug!("[{:?}] {}", event.state, event.step),
        }
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

struct Current {
    state: InstallState,
    step: String,
    file: Option<String>,
}

/// Run-scoped progress accounting shared by the orchestrator and download workers.
pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    downloaded: AtomicU64,
    total: AtomicU64,
    current: Mutex<Current>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            downloaded: AtomicU64::new(0),
            total: AtomicU64::new(0),
            current: Mutex::new(Current {
                state: InstallState::Created,
                step: String::new(),
                file: None,
            }),
        }
    }

    pub fn step(&self, state: InstallState, step: impl Into<String>) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            current.state = state;
            current.step = step.into();
            current.file = None;
        }
        self.emit();
    }

    pub fn file(&self, name: impl Into<String>) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            current.file = Some(name.into());
        }
        self.emit();
    }

    pub fn add_total(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::SeqCst);
    }

    pub fn add_downloaded(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::SeqCst);
        self.emit();
    }

    /// Take back bytes counted by a failed attempt.
    pub fn rewind(&self, bytes: u64) {
        let _ = self
            .downloaded
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(bytes))
            });
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressEvent {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        ProgressEvent {
            state: current.state,
            step: current.step.clone(),
            current_file: current.file.clone(),
            bytes_downloaded: self.downloaded(),
            bytes_total: self.total(),
        }
    }

    fn emit(&self) {
        self.sink.emit(self.snapshot());
    }
}
