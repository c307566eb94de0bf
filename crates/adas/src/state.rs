//! Detect/track state machine
//!
//! IDLE until a fresh classification qualifies for adoption; ACTIVE while
//! the tracker keeps the sign or new classifications refresh it.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::geometry::BoundingBox;
use crate::sign::SignDetection;
use crate::tracker::{AbandonReason, SignTracker, TrackState, TrackUpdate};

/// Machine phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignPhase {
    #[default]
    Idle,
    Active,
}

/// What happened on one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// No active sign and nothing adopted
    StayIdle,
    /// A new sign was adopted
    Adopted,
    /// The active sign was followed
    Tracked,
    /// The tracker lost the active sign
    Abandoned(AbandonReason),
}

/// The currently active sign
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSign {
    pub label: u32,
    pub track: TrackState,
}

/// Active label and the box to report for the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveReport {
    pub label: u32,
    pub bbox: BoundingBox,
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub transition: Transition,
    /// Set on every ACTIVE frame
    pub active: Option<ActiveReport>,
}

/// Detect/track state machine around a [`SignTracker`]
pub struct SignStateMachine {
    tracker: Box<dyn SignTracker>,
    active: Option<ActiveSign>,
    seed_inset: f32,
}

impl SignStateMachine {
    pub fn new(tracker: Box<dyn SignTracker>, seed_inset: f32) -> Self {
        Self {
            tracker,
            active: None,
            seed_inset,
        }
    }

    pub fn phase(&self) -> SignPhase {
        if self.active.is_some() {
            SignPhase::Active
        } else {
            SignPhase::Idle
        }
    }

    pub fn active(&self) -> Option<&ActiveSign> {
        self.active.as_ref()
    }

    /// Whether a fresh detection should replace the current state
    pub fn qualifies(&self, detection: &SignDetection, label_limit: u32) -> bool {
        detection.label > 0
            && self.active.as_ref().map(|a| a.label) != Some(detection.label)
            && detection.label < label_limit
    }

    /// Advance one frame
    pub fn step(
        &mut self,
        frame: &RgbImage,
        fresh: Option<&SignDetection>,
        label_limit: u32,
    ) -> StepOutcome {
        if let Some(detection) = fresh.filter(|d| self.qualifies(d, label_limit)) {
            let track = self
                .tracker
                .seed(frame, detection.bbox.inset(self.seed_inset));
            info!(
                "Adopted sign label {} at {:?} (frame {})",
                detection.label, detection.bbox, detection.frame_index
            );
            self.active = Some(ActiveSign {
                label: detection.label,
                track,
            });
            return StepOutcome {
                transition: Transition::Adopted,
                active: Some(ActiveReport {
                    label: detection.label,
                    bbox: detection.bbox,
                }),
            };
        }

        let Some(active) = self.active.as_mut() else {
            return StepOutcome {
                transition: Transition::StayIdle,
                active: None,
            };
        };

        match self.tracker.track(frame, &active.track) {
            TrackUpdate::Continue { bbox, size } => {
                active.track.bbox = bbox;
                active.track.size = size;
                // A same-frame classification gives a better box than the tracker
                let reported = fresh
                    .filter(|d| d.label > 0)
                    .map(|d| d.bbox)
                    .unwrap_or(bbox);
                StepOutcome {
                    transition: Transition::Tracked,
                    active: Some(ActiveReport {
                        label: active.label,
                        bbox: reported,
                    }),
                }
            }
            TrackUpdate::Abandon(reason) => {
                debug!("Stopped tracking label {}: {:?}", active.label, reason);
                self.active = None;
                StepOutcome {
                    transition: Transition::Abandoned(reason),
                    active: None,
                }
            }
        }
    }

    /// Drop any active sign
    pub fn reset(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Tracker replaying scripted updates and recording seed boxes
    struct ScriptedTracker {
        updates: Mutex<VecDeque<TrackUpdate>>,
        seeds: Arc<Mutex<Vec<BoundingBox>>>,
    }

    impl SignTracker for ScriptedTracker {
        fn seed(&self, _frame: &RgbImage, bbox: BoundingBox) -> TrackState {
            self.seeds.lock().unwrap().push(bbox);
            TrackState {
                histogram: vec![0.0; 16],
                bbox,
                size: bbox.diagonal(),
            }
        }

        fn track(&self, _frame: &RgbImage, state: &TrackState) -> TrackUpdate {
            self.updates
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TrackUpdate::Continue {
                    bbox: state.bbox,
                    size: state.size,
                })
        }
    }

    fn machine(updates: Vec<TrackUpdate>) -> (SignStateMachine, Arc<Mutex<Vec<BoundingBox>>>) {
        let seeds = Arc::new(Mutex::new(Vec::new()));
        let tracker = ScriptedTracker {
            updates: Mutex::new(updates.into()),
            seeds: Arc::clone(&seeds),
        };
        (SignStateMachine::new(Box::new(tracker), 0.05), seeds)
    }

    fn detection(label: u32, bbox: BoundingBox) -> SignDetection {
        SignDetection {
            frame_index: 0,
            label,
            bbox,
        }
    }

    fn frame() -> RgbImage {
        RgbImage::new(64, 48)
    }

    #[test]
    fn test_adoption_seeds_shrunk_box() {
        let (mut sm, seeds) = machine(vec![]);
        let bbox = BoundingBox::new(100, 100, 200, 140);

        let out = sm.step(&frame(), Some(&detection(3, bbox)), 8);
        assert_eq!(out.transition, Transition::Adopted);
        assert_eq!(out.active, Some(ActiveReport { label: 3, bbox }));
        assert_eq!(sm.phase(), SignPhase::Active);
        assert_eq!(seeds.lock().unwrap().as_slice(), &[BoundingBox::new(105, 102, 195, 138)]);
        assert_eq!(sm.active().unwrap().track.size, BoundingBox::new(105, 102, 195, 138).diagonal());
    }

    #[test]
    fn test_label_zero_and_idle() {
        let (mut sm, _) = machine(vec![]);
        let out = sm.step(&frame(), Some(&detection(0, BoundingBox::new(0, 0, 10, 10))), 8);
        assert_eq!(out.transition, Transition::StayIdle);
        assert_eq!(out.active, None);

        let out = sm.step(&frame(), None, 8);
        assert_eq!(out.transition, Transition::StayIdle);
    }

    #[test]
    fn test_same_label_not_readopted() {
        let tracked = BoundingBox::new(10, 10, 30, 30);
        let (mut sm, seeds) = machine(vec![TrackUpdate::Continue {
            bbox: tracked,
            size: 28.0,
        }]);
        let first = BoundingBox::new(12, 12, 32, 32);
        sm.step(&frame(), Some(&detection(2, first)), 8);

        // Same label again: tracker runs, fresh box is reported
        let fresh = BoundingBox::new(14, 14, 34, 34);
        let out = sm.step(&frame(), Some(&detection(2, fresh)), 8);
        assert_eq!(out.transition, Transition::Tracked);
        assert_eq!(out.active, Some(ActiveReport { label: 2, bbox: fresh }));
        assert_eq!(seeds.lock().unwrap().len(), 1);
        assert_eq!(sm.active().unwrap().track.bbox, tracked);
        assert_eq!(sm.active().unwrap().track.size, 28.0);
    }

    #[test]
    fn test_tracker_box_reported_without_fresh_detection() {
        let tracked = BoundingBox::new(20, 20, 40, 40);
        let (mut sm, _) = machine(vec![TrackUpdate::Continue {
            bbox: tracked,
            size: 28.3,
        }]);
        sm.step(&frame(), Some(&detection(5, BoundingBox::new(18, 18, 38, 38))), 8);

        let out = sm.step(&frame(), None, 8);
        assert_eq!(out.active, Some(ActiveReport { label: 5, bbox: tracked }));
    }

    #[test]
    fn test_label_limit_suppresses_adoption() {
        let (mut sm, _) = machine(vec![]);
        let bbox = BoundingBox::new(0, 0, 20, 20);

        // Speed-assist entitlement: limit 0 suppresses everything
        assert_eq!(sm.step(&frame(), Some(&detection(3, bbox)), 0).transition, Transition::StayIdle);
        // Catch-all label equals the default limit
        assert_eq!(sm.step(&frame(), Some(&detection(8, bbox)), 8).transition, Transition::StayIdle);
        assert_eq!(sm.step(&frame(), Some(&detection(7, bbox)), 8).transition, Transition::Adopted);
    }

    #[test]
    fn test_new_label_replaces_active() {
        let (mut sm, seeds) = machine(vec![]);
        sm.step(&frame(), Some(&detection(1, BoundingBox::new(0, 0, 20, 20))), 8);
        let out = sm.step(&frame(), Some(&detection(4, BoundingBox::new(30, 0, 50, 20))), 8);
        assert_eq!(out.transition, Transition::Adopted);
        assert_eq!(sm.active().unwrap().label, 4);
        assert_eq!(seeds.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_abandonment_returns_to_idle() {
        let (mut sm, _) = machine(vec![TrackUpdate::Abandon(AbandonReason::Exploded)]);
        sm.step(&frame(), Some(&detection(6, BoundingBox::new(0, 0, 20, 20))), 8);

        let out = sm.step(&frame(), None, 8);
        assert_eq!(out.transition, Transition::Abandoned(AbandonReason::Exploded));
        assert_eq!(out.active, None);
        assert_eq!(sm.phase(), SignPhase::Idle);
    }
}
