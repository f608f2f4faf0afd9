use crate::detection::domain::pose::Pose;
use crate::shared::bbox::BBox;

/// One person found in a frame.
///
/// `fall_score` carries the trained model's fall-class confidence when that
/// model contributed to the detection; `track_id` is assigned by the tracker.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonDetection {
    pub bbox: BBox,
    pub confidence: f64,
    pub pose: Option<Pose>,
    pub fall_score: Option<f64>,
    pub track_id: Option<u32>,
}

impl PersonDetection {
    pub fn new(bbox: BBox, confidence: f64) -> Self {
        Self {
            bbox,
            confidence,
            pose: None,
            fall_score: None,
            track_id: None,
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = Some(pose);
        self
    }

    pub fn with_fall_score(mut self, score: f64) -> Self {
        self.fall_score = Some(score);
        self
    }

    pub fn with_track_id(mut self, track_id: u32) -> Self {
        self.track_id = Some(track_id);
        self
    }
}
