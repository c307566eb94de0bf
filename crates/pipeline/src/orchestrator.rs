//! Frame Orchestrator
//!
//! Runs one frame through the ADAS stages in order and applies the side
//! effects: event log record, spoken alert, overlay composition and optional
//! session recording.

use std::time::Instant;

use adas::{AdasModule, BoundingBox, LaneAnalysis, SignPhase, Transition};
use alerting::{AlertDispatcher, AlertState};
use camera_capture::{FrameRecorder, VideoFrame};
use image::RgbImage;
use serde::Serialize;
use storage::{EventLog, PositionRecord};
use tracing::{debug, warn};

use crate::overlay::{blend, draw_box, ACTIVE_COLOR, CANDIDATE_COLOR};
use crate::PipelineError;

/// Result of one processed frame
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Active label, 0 when IDLE
    pub label: u32,
    /// Active sign box
    pub bbox: Option<BoundingBox>,
    pub lane: LaneAnalysis,
    pub transition: Transition,
    /// Whether a spoken alert was dispatched for this frame
    pub alert_dispatched: bool,
    /// Composited frame
    pub overlay: RgbImage,
}

/// Counters of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub active_frames: u64,
    pub records_written: usize,
    pub alerts_dispatched: usize,
    pub lane_warnings: u64,
    pub frames_recorded: u64,
}

/// Sequential per-frame driver
pub struct FrameOrchestrator {
    adas: AdasModule,
    dispatcher: AlertDispatcher,
    alert_state: AlertState,
    event_log: EventLog,
    recorder: Option<FrameRecorder>,
    label_limit: u32,
    width: u32,
    height: u32,
    frame_index: u64,
    active_frames: u64,
    lane_warnings: u64,
}

impl FrameOrchestrator {
    /// `label_limit` is the entitlement-resolved classification limit;
    /// `recorder` is present only when recording is entitled.
    pub fn new(
        adas: AdasModule,
        dispatcher: AlertDispatcher,
        event_log: EventLog,
        recorder: Option<FrameRecorder>,
        label_limit: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            adas,
            dispatcher,
            alert_state: AlertState::default(),
            event_log,
            recorder,
            label_limit,
            width,
            height,
            frame_index: 0,
            active_frames: 0,
            lane_warnings: 0,
        }
    }

    /// Index the next frame will receive
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn phase(&self) -> SignPhase {
        self.adas.phase()
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.alert_state
    }

    /// Process one frame at wall-clock `now`
    pub fn process(&mut self, frame: &VideoFrame, now: Instant) -> Result<FrameReport, PipelineError> {
        let image = frame
            .resize(self.width, self.height)
            .and_then(VideoFrame::into_rgb_image)
            .ok_or(PipelineError::InvalidFrame {
                sequence: frame.sequence,
            })?;

        let frame_index = self.frame_index;
        let analysis = self.adas.analyze(&image, frame_index, self.label_limit);
        if analysis.lane.departing {
            self.lane_warnings += 1;
        }

        let mut sign_image = image;
        if let Some(candidate) = &analysis.candidate {
            draw_box(&mut sign_image, candidate, CANDIDATE_COLOR);
        }

        let mut alert_dispatched = false;
        if let Some(active) = analysis.active {
            self.active_frames += 1;
            draw_box(&mut sign_image, &active.bbox, ACTIVE_COLOR);

            let record = PositionRecord {
                frame_index,
                label: active.label,
                left: active.bbox.left,
                top: active.bbox.top,
                right: active.bbox.right,
                bottom: active.bbox.bottom,
            };
            if let Err(e) = self.event_log.append(&record) {
                warn!("Event log write failed on frame {}: {}", frame_index, e);
            }

            if let Some(alert) = analysis.sign_alert() {
                alert_dispatched = self
                    .dispatcher
                    .dispatch(&mut self.alert_state, &alert.message(), now);
            }
        }

        let overlay = blend(&analysis.lane_image, &sign_image);

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write(&overlay) {
                warn!("Recording failed on frame {}: {}", frame_index, e);
            }
        }

        debug!(
            "Frame {}: label {} ({:?}), lane ratio {:?}",
            frame_index,
            analysis.label(),
            analysis.transition,
            analysis.lane.ratio
        );
        self.frame_index += 1;

        Ok(FrameReport {
            frame_index,
            label: analysis.label(),
            bbox: analysis.active.map(|a| a.bbox),
            lane: analysis.lane,
            transition: analysis.transition,
            alert_dispatched,
            overlay,
        })
    }

    /// Flush the event log, close the recording and return the session counters
    pub fn finish(&mut self) -> SessionSummary {
        if let Err(e) = self.event_log.flush() {
            warn!("Event log flush failed: {}", e);
        }

        let mut frames_recorded = 0;
        if let Some(recorder) = self.recorder.take() {
            frames_recorded = recorder.frames_written();
            if let Err(e) = recorder.finish() {
                warn!("Closing recording failed: {}", e);
            }
        }

        SessionSummary {
            frames_processed: self.frame_index,
            active_frames: self.active_frames,
            records_written: self.event_log.records_written(),
            alerts_dispatched: self.alert_state.dispatch_count,
            lane_warnings: self.lane_warnings,
            frames_recorded,
        }
    }
}
