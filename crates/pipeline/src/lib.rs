//! RoadSense Pipeline
//!
//! Wires the perception crates into the sequential frame loop:
//! configuration, logging, entitlement resolution, model loading and the
//! stop-aware run loop.

pub mod config;
pub mod orchestrator;
pub mod overlay;

pub use config::{LogFormat, PipelineConfig};
pub use orchestrator::{FrameOrchestrator, FrameReport, SessionSummary};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use adas::{AdasError, AdasModule, SignClassifier};
use alerting::{
    AlertDispatcher, AlertError, CommandSpeaker, LogSpeaker, Notifier, Speaker, SpeechNotifier,
};
use camera_capture::{CameraError, FrameRecorder, FrameSource, ImageSequenceSource};
use chrono::Local;
use entitlements::Entitlements;
use inference_engine::{InferenceError, LabelSet, OnnxSignModel};
use storage::{EventLog, StorageError};
use thiserror::Error;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("ADAS error: {0}")]
    Adas(#[from] AdasError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("Frame {sequence} has an inconsistent pixel buffer")]
    InvalidFrame { sequence: u32 },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

/// Initialize the global tracing subscriber
pub fn init_logging(level: &str, format: LogFormat) -> Result<(), PipelineError> {
    let level: Level = level.parse().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    result.map_err(|e| PipelineError::Logging(e.to_string()))
}

/// Speech notifier for the configured TTS command, or a logging one
pub fn build_notifier(config: &alerting::AlertConfig) -> Result<Arc<dyn Notifier>, PipelineError> {
    let speaker: Arc<dyn Speaker> = match &config.speech_command {
        Some(program) => {
            info!("Speaking alerts through {}", program);
            Arc::new(CommandSpeaker::new(program.clone(), config.speech_args.clone()))
        }
        None => Arc::new(LogSpeaker),
    };
    Ok(Arc::new(SpeechNotifier::new(speaker)?))
}

/// Load the model and labels, open the event log and assemble the orchestrator
pub fn build_orchestrator(
    config: &PipelineConfig,
    entitlements: Entitlements,
    notifier: Arc<dyn Notifier>,
) -> Result<FrameOrchestrator, PipelineError> {
    let model = OnnxSignModel::load(&config.model_path, SignClassifier::descriptor_len())?;
    let labels = match &config.labels_path {
        Some(path) => LabelSet::from_file(path)?,
        None => LabelSet::default(),
    };
    let classifier = SignClassifier::new(Box::new(model), labels)?;
    let adas = AdasModule::new(config.adas.clone(), classifier);

    let dispatcher = AlertDispatcher::new(config.alert.clone(), notifier);
    let event_log = EventLog::open(&config.event_log_path)?;

    let recorder = if entitlements.recording {
        Some(FrameRecorder::create(
            &config.recording_dir,
            Local::now(),
            config.source.width,
            config.source.height,
            config.source.fps,
        )?)
    } else {
        None
    };

    let label_limit = config.adas.sign.label_limit_for(entitlements.speed_assist);
    info!("Sign label limit: {}", label_limit);

    Ok(FrameOrchestrator::new(
        adas,
        dispatcher,
        event_log,
        recorder,
        label_limit,
        config.source.width,
        config.source.height,
    ))
}

/// Process frames until end of stream or until `stop` is raised.
///
/// A read failure ends the stream; a frame that cannot be processed is skipped.
pub async fn run_loop(
    orchestrator: &mut FrameOrchestrator,
    source: &mut dyn FrameSource,
    stop: &AtomicBool,
) -> SessionSummary {
    loop {
        if stop.load(Ordering::SeqCst) {
            info!("Stop requested");
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("End of stream");
                break;
            }
            Err(e) => {
                warn!("Frame read failed, ending stream: {}", e);
                break;
            }
        };

        match orchestrator.process(&frame, Instant::now()) {
            Ok(report) => debug!("Processed frame {}", report.frame_index),
            Err(e) => warn!("Skipping frame: {}", e),
        }

        // Let the Ctrl-C watcher and speech tasks make progress
        tokio::task::yield_now().await;
    }

    orchestrator.finish()
}

/// Run a complete session from configuration
pub async fn run(config: PipelineConfig, stop: Arc<AtomicBool>) -> Result<SessionSummary, PipelineError> {
    let entitlements = Entitlements::resolve(&config.entitlements);
    let notifier = build_notifier(&config.alert)?;
    let mut orchestrator = build_orchestrator(&config, entitlements, notifier)?;
    let mut source = ImageSequenceSource::open(&config.source.path, config.source.fps)?;

    let watcher = {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::SeqCst);
            }
        })
    };

    let summary = run_loop(&mut orchestrator, &mut source, &stop).await;
    watcher.abort();

    info!(
        "Session finished: {} frames, {} active, {} records, {} alerts, {} lane warnings, {} recorded",
        summary.frames_processed,
        summary.active_frames,
        summary.records_written,
        summary.alerts_dispatched,
        summary.lane_warnings,
        summary.frames_recorded
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{foliage_frame, orchestrator};
    use camera_capture::VideoFrame;
    use std::collections::VecDeque;

    struct QueueSource {
        frames: VecDeque<Result<VideoFrame, CameraError>>,
    }

    impl FrameSource for QueueSource {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
            self.frames.pop_front().transpose()
        }
    }

    fn source(frames: Vec<Result<VideoFrame, CameraError>>) -> QueueSource {
        QueueSource {
            frames: frames.into(),
        }
    }

    #[tokio::test]
    async fn test_runs_to_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, _) = orchestrator(&dir.path().join("Output.txt"), None);
        let mut source = source((0..3).map(|i| Ok(foliage_frame(720, 480, i))).collect());

        let summary = run_loop(&mut orchestrator, &mut source, &AtomicBool::new(false)).await;
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.active_frames, 0);
        assert_eq!(summary.records_written, 0);
    }

    #[tokio::test]
    async fn test_read_failure_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, _) = orchestrator(&dir.path().join("Output.txt"), None);
        let mut source = source(vec![
            Ok(foliage_frame(720, 480, 0)),
            Err(CameraError::Stream("truncated file".into())),
            Ok(foliage_frame(720, 480, 2)),
        ]);

        let summary = run_loop(&mut orchestrator, &mut source, &AtomicBool::new(false)).await;
        assert_eq!(summary.frames_processed, 1);
    }

    #[tokio::test]
    async fn test_stop_flag_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut orchestrator, _) = orchestrator(&dir.path().join("Output.txt"), None);
        let mut source = source(vec![Ok(foliage_frame(720, 480, 0))]);

        let summary = run_loop(&mut orchestrator, &mut source, &AtomicBool::new(true)).await;
        assert_eq!(summary.frames_processed, 0);
        assert_eq!(source.frames.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            model_path: dir.path().join("absent.onnx"),
            event_log_path: dir.path().join("Output.txt"),
            ..PipelineConfig::default()
        };
        let notifier = build_notifier(&config.alert).unwrap();

        assert!(matches!(
            build_orchestrator(&config, Entitlements::default(), notifier),
            Err(PipelineError::Inference(_))
        ));
    }
}
