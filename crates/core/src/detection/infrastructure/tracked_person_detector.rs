use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::frame::Frame;

use super::person_tracker::PersonTracker;

/// Decorator that stamps tracker ids onto the inner detector's output.
///
/// Detections the tracker could not associate keep `track_id: None` and are
/// still returned, so they can be drawn even though they never produce
/// fall events.
pub struct TrackedPersonDetector {
    inner: Box<dyn PersonDetector>,
    tracker: PersonTracker,
}

impl TrackedPersonDetector {
    pub fn new(inner: Box<dyn PersonDetector>, tracker: PersonTracker) -> Self {
        Self { inner, tracker }
    }
}

impl PersonDetector for TrackedPersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        let mut people = self.inner.detect(frame)?;
        let boxes: Vec<_> = people.iter().map(|p| (p.bbox, p.confidence)).collect();
        for assignment in self.tracker.update(&boxes) {
            people[assignment.det_index].track_id = Some(assignment.track_id);
        }
        Ok(people)
    }
}
