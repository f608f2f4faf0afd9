use crate::fall::domain::posture_classifier::EvidenceSource;
use crate::shared::bbox::BBox;

/// A confirmed fall of one tracked person.
#[derive(Debug, Clone, PartialEq)]
pub struct FallEvent {
    pub track_id: u32,
    /// First frame of the fallen streak.
    pub start_frame: usize,
    /// Frame on which the streak reached the confirmation length.
    pub confirmed_frame: usize,
    pub timestamp_secs: f64,
    /// Peak score over the streak.
    pub confidence: f64,
    pub bbox: BBox,
    pub source: EvidenceSource,
}
