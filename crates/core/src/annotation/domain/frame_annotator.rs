use crate::fall::domain::fall_monitor::PersonStatusView;
use crate::shared::frame::Frame;

/// Draws analysis results onto a frame in place.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &mut Frame,
        people: &[PersonStatusView],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
