//! Progress reporting and cooperative cancellation

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Long-running phases reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Detecting,
    Loading,
    ResolvingAssets,
    Enriching,
    Verifying,
    Merging,
    Copying,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Detecting => "detecting",
            Stage::Loading => "loading",
            Stage::ResolvingAssets => "resolving assets",
            Stage::Enriching => "enriching metadata",
            Stage::Verifying => "verifying",
            Stage::Merging => "merging",
            Stage::Copying => "copying",
            Stage::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// Progress events emitted while analysing or converting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted { stage: Stage, detail: String },
    ItemProcessed { index: usize, total: usize },
    Warning { message: String },
    Error { message: String },
}

/// Receives progress events. Implementations must tolerate calls from worker threads.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);

    fn stage(&self, stage: Stage, detail: &str) {
        self.emit(ProgressEvent::StageStarted {
            stage,
            detail: detail.to_string(),
        });
    }

    fn item(&self, index: usize, total: usize) {
        self.emit(ProgressEvent::ItemProcessed { index, total });
    }

    fn warning(&self, message: String) {
        self.emit(ProgressEvent::Warning { message });
    }

    fn error(&self, message: String) {
        self.emit(ProgressEvent::Error { message });
    }
}

/// Discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage, detail } => tracing::info!("{stage}: {detail}"),
            ProgressEvent::ItemProcessed { index, total } => tracing::debug!("{index}/{total}"),
            ProgressEvent::Warning { message } => tracing::warn!("{message}"),
            ProgressEvent::Error { message } => tracing::error!("{message}"),
        }
    }
}

/// Counts finished items across worker threads. The count is emitted under the lock,
/// so `ItemProcessed` indices reach the sink in increasing order.
#[derive(Debug)]
pub struct ItemCounter {
    total: usize,
    done: Mutex<usize>,
}

impl ItemCounter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: Mutex::new(0),
        }
    }

    /// Count one item and report it
    pub fn tick(&self, sink: &dyn ProgressSink) {
        let mut done = match self.done.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *done += 1;
        sink.item(*done, self.total);
    }
}

/// Shared cancellation flag, checked between units of work
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
