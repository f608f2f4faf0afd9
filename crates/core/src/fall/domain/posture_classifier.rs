use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detection::domain::person_detection::PersonDetection;

/// Torso angles at or below this are scored as fully upright.
const UPRIGHT_ANGLE_DEG: f64 = 30.0;
/// Range over which the pose score ramps from 0 to 1.
const ANGLE_RAMP_DEG: f64 = 45.0;
const UPRIGHT_ASPECT: f64 = 0.8;
const ASPECT_RAMP: f64 = 0.8;

/// Which signals may declare a person fallen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallStrategy {
    /// Trained model and pose geometry, either one is enough.
    #[default]
    #[serde(rename = "combined")]
    Combined,
    /// Trained model only.
    #[serde(rename = "model")]
    ModelOnly,
    /// Pose geometry only.
    #[serde(rename = "pose")]
    PoseOnly,
}

/// What backed a fall decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceSource {
    Model,
    Pose,
    Combined,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceSource::Model => "model",
            EvidenceSource::Pose => "pose",
            EvidenceSource::Combined => "combined",
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallAssessment {
    pub fallen: bool,
    /// Strongest score among the signals the strategy allows, in `[0, 1]`.
    pub score: f64,
    pub source: EvidenceSource,
}

/// Single-frame fall decision for one detection.
#[derive(Debug, Clone, Copy)]
pub struct PostureClassifier {
    strategy: FallStrategy,
    model_threshold: f64,
    pose_threshold: f64,
}

impl PostureClassifier {
    pub fn new(strategy: FallStrategy, model_threshold: f64, pose_threshold: f64) -> Self {
        Self {
            strategy,
            model_threshold,
            pose_threshold,
        }
    }

    pub fn assess(&self, person: &PersonDetection) -> FallAssessment {
        let model_score = match self.strategy {
            FallStrategy::PoseOnly => None,
            _ => person.fall_score,
        };
        let pose_score = match self.strategy {
            FallStrategy::ModelOnly => None,
            _ => Some(pose_score(person)),
        };

        let model_fired = model_score.is_some_and(|s| s >= self.model_threshold);
        let pose_fired = pose_score.is_some_and(|s| s >= self.pose_threshold);
        let m = model_score.unwrap_or(0.0);
        let p = pose_score.unwrap_or(0.0);

        let source = match (model_fired, pose_fired) {
            (true, true) => EvidenceSource::Combined,
            (true, false) => EvidenceSource::Model,
            (false, true) => EvidenceSource::Pose,
            (false, false) if model_score.is_some() && m >= p => EvidenceSource::Model,
            (false, false) if pose_score.is_some() => EvidenceSource::Pose,
            (false, false) => EvidenceSource::Model,
        };

        FallAssessment {
            fallen: model_fired || pose_fired,
            score: m.max(p).clamp(0.0, 1.0),
            source,
        }
    }
}

/// Geometric lying score in `[0, 1]`.
///
/// Uses the torso angle when shoulders and hips are visible, else the box
/// aspect ratio.
pub fn pose_score(person: &PersonDetection) -> f64 {
    if let Some(angle) = person.pose.as_ref().and_then(|p| p.torso_angle()) {
        return ((angle - UPRIGHT_ANGLE_DEG) / ANGLE_RAMP_DEG).clamp(0.0, 1.0);
    }
    ((person.bbox.aspect_ratio() - UPRIGHT_ASPECT) / ASPECT_RAMP).clamp(0.0, 1.0)
}
