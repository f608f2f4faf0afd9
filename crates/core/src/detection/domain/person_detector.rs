use crate::detection::domain::person_detection::PersonDetection;
use crate::shared::frame::Frame;

/// Domain interface for finding people in a frame.
///
/// Implementations may be stateful (e.g., tracking across frames),
/// hence `&mut self`.
pub trait PersonDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>>;
}
