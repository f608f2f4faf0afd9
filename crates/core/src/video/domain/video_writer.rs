use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sink for annotated frames.
pub trait VideoWriter: Send {
    /// Creates `path`, sized and timed from `metadata`.
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes and finalises the file. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
