use std::collections::HashMap;

use crate::detection::domain::person_detection::PersonDetection;
use crate::fall::domain::fall_event::FallEvent;
use crate::fall::domain::posture_classifier::{EvidenceSource, PostureClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonStatus {
    Upright,
    Falling,
    Fallen,
}

/// A detection together with its status on the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonStatusView {
    pub detection: PersonDetection,
    pub status: PersonStatus,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FrameAssessment {
    pub people: Vec<PersonStatusView>,
    /// Falls confirmed on this frame.
    pub events: Vec<FallEvent>,
}

impl FrameAssessment {
    pub fn any_fallen(&self) -> bool {
        self.people.iter().any(|p| p.status == PersonStatus::Fallen)
    }
}

#[derive(Debug, Clone)]
struct TrackState {
    status: PersonStatus,
    streak_start: usize,
    fallen_streak: usize,
    recovery_streak: usize,
    peak: f64,
    source: EvidenceSource,
    last_seen: usize,
}

impl TrackState {
    fn upright(frame_index: usize) -> Self {
        Self {
            status: PersonStatus::Upright,
            streak_start: frame_index,
            fallen_streak: 0,
            recovery_streak: 0,
            peak: 0.0,
            source: EvidenceSource::Model,
            last_seen: frame_index,
        }
    }
}

/// Turns per-frame posture assessments into confirmed fall events.
///
/// Each track runs `Upright -> Falling -> Fallen`. A track reaches `Fallen`
/// after `min_fall_frames` consecutive fallen frames and emits exactly one
/// event; it only re-arms after `recovery_frames` consecutive upright
/// frames.
pub struct FallMonitor {
    classifier: PostureClassifier,
    min_fall_frames: usize,
    recovery_frames: usize,
    max_missing_frames: usize,
    tracks: HashMap<u32, TrackState>,
}

impl FallMonitor {
    pub fn new(
        classifier: PostureClassifier,
        min_fall_frames: usize,
        recovery_frames: usize,
        max_missing_frames: usize,
    ) -> Self {
        Self {
            classifier,
            min_fall_frames: min_fall_frames.max(1),
            recovery_frames: recovery_frames.max(1),
            max_missing_frames,
            tracks: HashMap::new(),
        }
    }

    pub fn observe(
        &mut self,
        frame_index: usize,
        timestamp_secs: f64,
        detections: &[PersonDetection],
    ) -> FrameAssessment {
        let mut out = FrameAssessment::default();

        for detection in detections {
            let assessment = self.classifier.assess(detection);
            let Some(track_id) = detection.track_id else {
                let status = if assessment.fallen {
                    PersonStatus::Falling
                } else {
                    PersonStatus::Upright
                };
                out.people.push(PersonStatusView {
                    detection: detection.clone(),
                    status,
                    score: assessment.score,
                });
                continue;
            };

            let min_fall_frames = self.min_fall_frames;
            let recovery_frames = self.recovery_frames;
            let state = self
                .tracks
                .entry(track_id)
                .or_insert_with(|| TrackState::upright(frame_index));
            state.last_seen = frame_index;

            match (state.status, assessment.fallen) {
                (PersonStatus::Upright, true) => {
                    state.status = PersonStatus::Falling;
                    state.streak_start = frame_index;
                    state.fallen_streak = 1;
                    state.peak = assessment.score;
                    state.source = assessment.source;
                }
                (PersonStatus::Falling, true) => {
                    state.fallen_streak += 1;
                    state.peak = state.peak.max(assessment.score);
                    state.source = merge_sources(state.source, assessment.source);
                }
                (PersonStatus::Falling, false) => {
                    state.status = PersonStatus::Upright;
                    state.fallen_streak = 0;
                }
                (PersonStatus::Fallen, true) => state.recovery_streak = 0,
                (PersonStatus::Fallen, false) => {
                    state.recovery_streak += 1;
                    if state.recovery_streak >= recovery_frames {
                        log::debug!("Track {track_id} recovered at frame {frame_index}");
                        *state = TrackState::upright(frame_index);
                    }
                }
                (PersonStatus::Upright, false) => {}
            }

            if state.status == PersonStatus::Falling && state.fallen_streak >= min_fall_frames {
                state.status = PersonStatus::Fallen;
                state.recovery_streak = 0;
                log::info!(
                    "Fall confirmed: track {track_id} at frame {frame_index} ({:.2}, {})",
                    state.peak,
                    state.source
                );
                out.events.push(FallEvent {
                    track_id,
                    start_frame: state.streak_start,
                    confirmed_frame: frame_index,
                    timestamp_secs,
                    confidence: state.peak,
                    bbox: detection.bbox,
                    source: state.source,
                });
            }

            out.people.push(PersonStatusView {
                detection: detection.clone(),
                status: state.status,
                score: assessment.score,
            });
        }

        let max_missing = self.max_missing_frames;
        self.tracks
            .retain(|_, t| frame_index.saturating_sub(t.last_seen) <= max_missing);

        out
    }

    pub fn status_of(&self, track_id: u32) -> Option<PersonStatus> {
        self.tracks.get(&track_id).map(|t| t.status)
    }
}

fn merge_sources(a: EvidenceSource, b: EvidenceSource) -> EvidenceSource {
    if a == b {
        a
    } else {
        EvidenceSource::Combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fall::domain::posture_classifier::FallStrategy;
    use crate::shared::bbox::BBox;
    use approx::assert_relative_eq;

    fn monitor(min_fall: usize, recovery: usize, missing: usize) -> FallMonitor {
        FallMonitor::new(
            PostureClassifier::new(FallStrategy::ModelOnly, 0.5, 0.6),
            min_fall,
            recovery,
            missing,
        )
    }

    fn person(track: Option<u32>, score: f64) -> PersonDetection {
        let mut p = PersonDetection::new(BBox::new(10.0, 10.0, 60.0, 160.0), 0.9)
            .with_fall_score(score);
        p.track_id = track;
        p
    }

    /// Feeds one detection per frame and returns all events.
    fn run(monitor: &mut FallMonitor, scores: &[f64]) -> Vec<FallEvent> {
        scores
            .iter()
            .enumerate()
            .flat_map(|(i, &s)| monitor.observe(i, i as f64 / 10.0, &[person(Some(1), s)]).events)
            .collect()
    }

    #[test]
    fn test_single_event_per_streak() {
        let mut m = monitor(3, 2, 10);
        let events = run(&mut m, &[0.1, 0.8, 0.9, 0.7, 0.8, 0.9, 0.9]);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.track_id, 1);
        assert_eq!(e.start_frame, 1);
        assert_eq!(e.confirmed_frame, 3);
        assert_relative_eq!(e.timestamp_secs, 0.3);
        assert_relative_eq!(e.confidence, 0.9);
        assert_eq!(e.source, EvidenceSource::Model);
    }

    #[test]
    fn test_interrupted_streak_resets() {
        let mut m = monitor(3, 2, 10);
        let events = run(&mut m, &[0.8, 0.8, 0.1, 0.8, 0.8]);
        assert!(events.is_empty());
        assert_eq!(m.status_of(1), Some(PersonStatus::Falling));
    }

    #[test]
    fn test_rearms_only_after_recovery() {
        let mut m = monitor(2, 3, 10);
        // fall, two upright frames (not enough), fall again: still one event
        let events = run(&mut m, &[0.9, 0.9, 0.1, 0.1, 0.9, 0.9]);
        assert_eq!(events.len(), 1);

        // three upright frames re-arm, the next streak fires again
        let mut m = monitor(2, 3, 10);
        let events = run(&mut m, &[0.9, 0.9, 0.1, 0.1, 0.1, 0.9, 0.9]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].start_frame, 5);
    }

    #[test]
    fn test_untracked_never_emits() {
        let mut m = monitor(1, 1, 10);
        let out = m.observe(0, 0.0, &[person(None, 0.99)]);
        assert!(out.events.is_empty());
        assert_eq!(out.people[0].status, PersonStatus::Falling);
    }

    #[test]
    fn test_min_fall_frames_one_fires_immediately() {
        let mut m = monitor(1, 1, 10);
        let out = m.observe(4, 0.4, &[person(Some(7), 0.9)]);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].start_frame, 4);
        assert!(out.any_fallen());
    }

    #[test]
    fn test_missing_track_is_forgotten() {
        let mut m = monitor(2, 5, 2);
        m.observe(0, 0.0, &[person(Some(1), 0.9)]);
        m.observe(1, 0.1, &[person(Some(1), 0.9)]);
        assert_eq!(m.status_of(1), Some(PersonStatus::Fallen));
        m.observe(2, 0.2, &[]);
        m.observe(3, 0.3, &[]);
        assert!(m.status_of(1).is_some());
        m.observe(4, 0.4, &[]);
        assert!(m.status_of(1).is_none());

        // same id coming back starts fresh and can fall again
        let events: Vec<_> = (5..7)
            .flat_map(|i| m.observe(i, 0.0, &[person(Some(1), 0.9)]).events)
            .collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut m = monitor(2, 2, 10);
        m.observe(0, 0.0, &[person(Some(1), 0.9), person(Some(2), 0.1)]);
        let out = m.observe(1, 0.1, &[person(Some(1), 0.9), person(Some(2), 0.9)]);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.events[0].track_id, 1);
        assert_eq!(out.people[1].status, PersonStatus::Falling);
    }
}
