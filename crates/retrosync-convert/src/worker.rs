//! Background analysis and conversion
//!
//! A job runs on a named thread and streams [`ProgressEvent`]s over a bounded channel.
//! The final result arrives as the last message. Cancellation is cooperative through
//! the shared [`CancelToken`].

use crate::engine::{ConversionEngine, ConversionOptions};
use crate::report::ConversionReport;
use crate::ConvertError;
use retrosync_config::EngineConfig;
use retrosync_library::{AnalyzeOptions, CancelToken, Library, Normalizer, ProgressEvent, ProgressSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError, sync_channel};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Message from a background job
#[derive(Debug)]
pub enum WorkerEvent<T> {
    Progress(ProgressEvent),
    Completed(T),
}

/// Forwards progress into the job's channel. Events are dropped once the receiver is
/// gone.
struct ChannelProgress<T> {
    sender: SyncSender<WorkerEvent<T>>,
}

impl<T: Send> ProgressSink for ChannelProgress<T> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(WorkerEvent::Progress(event));
    }
}

/// Handle on a running job
pub struct WorkerHandle<T> {
    events: Receiver<WorkerEvent<T>>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl<T> WorkerHandle<T> {
    /// Next event if one is waiting
    pub fn try_recv(&self) -> Option<WorkerEvent<T>> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerEvent<T>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// All events waiting right now
    pub fn drain(&self) -> Vec<WorkerEvent<T>> {
        self.events.try_iter().collect()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the job completes, passing progress to `on_progress`
    pub fn wait_with(mut self, mut on_progress: impl FnMut(ProgressEvent)) -> Option<T> {
        let mut result = None;
        for event in self.events.iter() {
            match event {
                WorkerEvent::Progress(progress) => on_progress(progress),
                WorkerEvent::Completed(value) => {
                    result = Some(value);
                    break;
                }
            }
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            debug!("Worker thread panicked");
        }
        result
    }

    /// Block until the job completes, discarding progress. `None` when the job thread
    /// died without a result.
    pub fn wait(self) -> Option<T> {
        self.wait_with(|_| {})
    }
}

fn spawn<T, F>(name: &str, queue_capacity: usize, cancel: CancelToken, job: F) -> Result<WorkerHandle<T>, ConvertError>
where
    T: Send + 'static,
    F: FnOnce(Arc<dyn ProgressSink>, CancelToken) -> T + Send + 'static,
{
    let (sender, events) = sync_channel(queue_capacity.max(1));
    let progress: Arc<dyn ProgressSink> = Arc::new(ChannelProgress {
        sender: sender.clone(),
    });
    let job_cancel = cancel.clone();

    let thread = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let result = job(progress, job_cancel);
            let _ = sender.send(WorkerEvent::Completed(result));
        })?;

    Ok(WorkerHandle {
        events,
        cancel,
        thread: Some(thread),
    })
}

/// Analyse `root` in the background
pub fn spawn_analysis(
    config: &EngineConfig,
    root: PathBuf,
    options: AnalyzeOptions,
) -> Result<WorkerHandle<Result<Library, ConvertError>>, ConvertError> {
    let config = config.clone();
    spawn(
        "retrosync-analyze",
        config.worker.queue_capacity,
        CancelToken::new(),
        move |progress, cancel| {
            let normalizer = Normalizer::new(&config)?
                .with_progress(progress)
                .with_cancel(cancel);
            Ok(normalizer.analyze(&root, &options)?)
        },
    )
}

/// Convert `library` into `target` in the background
pub fn spawn_conversion(
    config: &EngineConfig,
    library: Library,
    target: String,
    output_root: PathBuf,
    options: ConversionOptions,
) -> Result<WorkerHandle<Result<ConversionReport, ConvertError>>, ConvertError> {
    spawn_conversion_with(config, library, target, output_root, options, CancelToken::new())
}

/// [`spawn_conversion`] observing a caller-owned cancel token
pub fn spawn_conversion_with(
    config: &EngineConfig,
    library: Library,
    target: String,
    output_root: PathBuf,
    options: ConversionOptions,
    cancel: CancelToken,
) -> Result<WorkerHandle<Result<ConversionReport, ConvertError>>, ConvertError> {
    let config = config.clone();
    spawn(
        "retrosync-convert",
        config.worker.queue_capacity,
        cancel,
        move |progress, cancel| {
            let engine = ConversionEngine::new(&config)?
                .with_progress(progress)
                .with_cancel(cancel);
            engine.convert(&library, &target, &output_root, &options)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SystemStatus;
    use retrosync_library::{Game, Stage, System};
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn files_under(dir: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| {
                let path = entry.path();
                if path.is_dir() { files_under(&path) } else { 1 }
            })
            .sum()
    }

    #[test]
    fn test_conversion_reports_progress_then_result() {
        let dir = TempDir::new().unwrap();
        let library = Library {
            source_root: dir.path().join("src"),
            source_ecosystem: "es_classic".to_string(),
            detection_confidence: 1.0,
            systems: Vec::new(),
            issues: Vec::new(),
        };

        let handle = spawn_conversion(
            &EngineConfig::default(),
            library,
            "es_de".to_string(),
            dir.path().join("out"),
            ConversionOptions::default(),
        )
        .unwrap();
        let report = handle.wait().unwrap().unwrap();
        assert_eq!(report.target, "es_de");
        assert!(report.systems.is_empty());
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_analysis_of_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let handle = spawn_analysis(
            &EngineConfig::default(),
            dir.path().join("missing"),
            AnalyzeOptions::default(),
        )
        .unwrap();

        let mut stages = Vec::new();
        let result = handle
            .wait_with(|event| {
                if let ProgressEvent::StageStarted { stage, .. } = event {
                    stages.push(stage);
                }
            })
            .unwrap();
        assert!(matches!(
            result,
            Err(ConvertError::Library(retrosync_library::LibraryError::SourceUnreadable(_)))
        ));
        assert!(!stages.contains(&Stage::Loading));
    }

    #[test]
    fn test_cancel_before_start() {
        let dir = TempDir::new().unwrap();
        let rom_root = dir.path().join("src/roms/nes");
        std::fs::create_dir_all(&rom_root).unwrap();
        std::fs::write(rom_root.join("Contra.nes"), b"rom").unwrap();
        let library = Library {
            source_root: dir.path().join("src"),
            source_ecosystem: "es_classic".to_string(),
            detection_confidence: 1.0,
            systems: vec![System {
                system_id: "nes".to_string(),
                display_name: "Nintendo Entertainment System".to_string(),
                source_platform_label: "nes".to_string(),
                rom_root,
                asset_roots: BTreeMap::new(),
                container_path: None,
                needs_mapping: false,
                target_label: None,
                games: vec![Game::new("nes", PathBuf::from("Contra.nes"), "Contra")],
            }],
            issues: Vec::new(),
        };

        let cancel = CancelToken::new();
        cancel.cancel();
        let out = dir.path().join("out");
        let handle = spawn_conversion_with(
            &EngineConfig::default(),
            library,
            "es_de".to_string(),
            out.clone(),
            ConversionOptions::default(),
            cancel,
        )
        .unwrap();

        let report = handle.wait().unwrap().unwrap();
        assert_eq!(report.systems.len(), 1);
        assert_eq!(report.systems[0].status, SystemStatus::Cancelled);
        assert!(!report.systems[0].container_written);
        assert_eq!(files_under(&out), 0);
    }
}
