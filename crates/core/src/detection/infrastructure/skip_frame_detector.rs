use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::frame::Frame;

/// Decorator that runs detection every N frames and repeats the last result
/// in between.
///
/// People move slowly relative to the frame rate, so repeating positions for
/// a couple of frames is harmless. Because the repeated frames carry the same
/// track ids and fall scores, the fall monitor still counts them towards a
/// streak.
pub struct SkipFrameDetector {
    inner: Box<dyn PersonDetector>,
    skip_interval: usize,
    frame_count: usize,
    last: Vec<PersonDetection>,
}

impl SkipFrameDetector {
    pub fn new(inner: Box<dyn PersonDetector>, skip_interval: usize) -> Result<Self, &'static str> {
        if skip_interval < 1 {
            return Err("skip_interval must be >= 1");
        }
        Ok(Self {
            inner,
            skip_interval,
            frame_count: 0,
            last: Vec::new(),
        })
    }
}

impl PersonDetector for SkipFrameDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        if self.frame_count % self.skip_interval == 0 {
            self.last = self.inner.detect(frame)?;
        }
        self.frame_count += 1;
        Ok(self.last.clone())
    }
}
