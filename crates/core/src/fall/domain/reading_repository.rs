use crate::fall::domain::fall_reading::{FallReading, NewFallReading};

/// Storage for confirmed fall readings.
///
/// Shared between threads behind an `Arc`, so implementations synchronise
/// internally.
pub trait FallReadingRepository: Send + Sync {
    /// Stores `readings` atomically and returns how many were written.
    fn insert_readings(
        &self,
        readings: &[NewFallReading],
    ) -> Result<usize, Box<dyn std::error::Error>>;

    /// Every stored reading, oldest first.
    fn get_all_cv_fall_readings(&self) -> Result<Vec<FallReading>, Box<dyn std::error::Error>>;

    fn get_readings_for_video(
        &self,
        video_path: &str,
    ) -> Result<Vec<FallReading>, Box<dyn std::error::Error>>;
}
