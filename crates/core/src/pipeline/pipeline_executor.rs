use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::person_detector::PersonDetector;
use crate::fall::domain::fall_monitor::FallMonitor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::analysis_report::AnalysisReport;

/// Progress callback: `(frames_done, total_frames)`. Returning `false`
/// aborts the run with an error.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

pub struct PipelineConfig {
    pub on_progress: Option<ProgressFn>,
    /// Stops the run early without an error once set.
    pub cancelled: Arc<AtomicBool>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Runs read -> detect -> monitor/annotate -> write over one video.
///
/// Without a writer, frames are analysed but nothing is encoded.
pub trait PipelineExecutor: Send {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Option<Box<dyn VideoWriter>>,
        detector: Box<dyn PersonDetector>,
        monitor: FallMonitor,
        annotator: Box<dyn FrameAnnotator>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<AnalysisReport, Box<dyn std::error::Error>>;
}
