use std::time::Duration;

use crate::fall::domain::fall_event::FallEvent;

/// Outcome of analysing one video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisReport {
    pub frames_processed: usize,
    /// Processing throughput in frames per second of wall time.
    pub fps: f64,
    pub elapsed: Duration,
    pub events: Vec<FallEvent>,
}

impl AnalysisReport {
    pub fn new(frames_processed: usize, elapsed: Duration, events: Vec<FallEvent>) -> Self {
        let secs = elapsed.as_secs_f64();
        let fps = if secs > 0.0 {
            frames_processed as f64 / secs
        } else {
            0.0
        };
        Self {
            frames_processed,
            fps,
            elapsed,
            events,
        }
    }

    pub fn fall_count(&self) -> usize {
        self.events.len()
    }
}
