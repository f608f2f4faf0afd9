use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use thiserror::Error;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::person_detector::PersonDetector;
use crate::fall::domain::fall_monitor::FallMonitor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::analysis_report::AnalysisReport;
use super::pipeline_executor::{PipelineConfig, PipelineExecutor, ProgressFn};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("input video not found: {0}")]
    InputMissing(PathBuf),
    #[error("analysis already executed")]
    AlreadyExecuted,
}

/// Analyses one video for falls.
///
/// Single-use: `execute` hands the owned components to the executor, so a
/// second call fails with [`AnalysisError::AlreadyExecuted`].
pub struct AnalyzeVideoUseCase {
    reader: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn VideoWriter>>,
    detector: Option<Box<dyn PersonDetector>>,
    monitor: Option<FallMonitor>,
    annotator: Option<Box<dyn FrameAnnotator>>,
    executor: Box<dyn PipelineExecutor>,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
    executed: bool,
}

impl AnalyzeVideoUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Option<Box<dyn VideoWriter>>,
        detector: Box<dyn PersonDetector>,
        monitor: FallMonitor,
        annotator: Box<dyn FrameAnnotator>,
        executor: Box<dyn PipelineExecutor>,
        on_progress: Option<ProgressFn>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer,
            detector: Some(detector),
            monitor: Some(monitor),
            annotator: Some(annotator),
            executor,
            on_progress,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
            executed: false,
        }
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
        output_path: &Path,
    ) -> Result<AnalysisReport, Box<dyn std::error::Error>> {
        if self.executed {
            return Err(AnalysisError::AlreadyExecuted.into());
        }
        let (Some(reader), Some(detector), Some(monitor), Some(annotator)) = (
            self.reader.take(),
            self.detector.take(),
            self.monitor.take(),
            self.annotator.take(),
        ) else {
            return Err(AnalysisError::AlreadyExecuted.into());
        };
        self.executed = true;

        let config = PipelineConfig {
            on_progress: self.on_progress.take(),
            cancelled: self.cancelled.clone(),
        };
        self.executor.execute(
            reader,
            self.writer.take(),
            detector,
            monitor,
            annotator,
            metadata,
            output_path,
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fall::domain::fall_monitor::PersonStatus;
    use crate::fall::domain::posture_classifier::{FallStrategy, PostureClassifier};
    use crate::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
    use crate::pipeline::test_support::*;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    fn monitor() -> FallMonitor {
        FallMonitor::new(
            PostureClassifier::new(FallStrategy::ModelOnly, 0.5, 0.6),
            3,
            4,
            30,
        )
    }

    fn use_case(
        frames: usize,
        writer: Option<StubWriter>,
        detector: Box<dyn PersonDetector>,
        annotator: RecordingAnnotator,
    ) -> AnalyzeVideoUseCase {
        AnalyzeVideoUseCase::new(
            Box::new(StubReader::new(make_frames(frames))),
            writer.map(|w| Box::new(w) as Box<dyn VideoWriter>),
            detector,
            monitor(),
            Box::new(annotator),
            Box::new(ThreadedPipelineExecutor::new()),
            None,
            None,
        )
    }

    #[test]
    fn test_writes_every_frame_in_order() {
        let writer = StubWriter::new();
        let written = writer.written.clone();
        let mut uc = use_case(
            10,
            Some(writer),
            Box::new(ScriptedDetector::empty()),
            RecordingAnnotator::new(),
        );

        let report = uc.execute(&metadata(10), Path::new("/tmp/out.mp4")).unwrap();
        assert_eq!(report.frames_processed, 10);
        let written = written.lock().unwrap();
        let indices: Vec<usize> = written.iter().map(|f| f.index()).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_opens_writer_at_output_path() {
        let writer = StubWriter::new();
        let opened = writer.opened_at.clone();
        let mut uc = use_case(
            1,
            Some(writer),
            Box::new(ScriptedDetector::empty()),
            RecordingAnnotator::new(),
        );
        uc.execute(&metadata(1), Path::new("/tmp/annotated.mp4"))
            .unwrap();
        assert_eq!(
            opened.lock().unwrap().as_deref(),
            Some(Path::new("/tmp/annotated.mp4"))
        );
    }

    #[test]
    fn test_empty_video() {
        let writer = StubWriter::new();
        let written = writer.written.clone();
        let mut uc = use_case(
            0,
            Some(writer),
            Box::new(ScriptedDetector::empty()),
            RecordingAnnotator::new(),
        );
        let report = uc.execute(&metadata(0), Path::new("/tmp/out.mp4")).unwrap();
        assert_eq!(report.frames_processed, 0);
        assert!(report.events.is_empty());
        assert!(written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fall_is_reported_once_and_annotated() {
        let annotator = RecordingAnnotator::new();
        let calls = annotator.calls.clone();
        let mut uc = use_case(
            10,
            Some(StubWriter::new()),
            Box::new(ScriptedDetector::one_person(10, 2..9)),
            annotator,
        );

        let report = uc.execute(&metadata(10), Path::new("/tmp/out.mp4")).unwrap();
        assert_eq!(report.fall_count(), 1);
        assert_eq!(report.events[0].start_frame, 2);
        assert_eq!(report.events[0].confirmed_frame, 4);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 10);
        assert_eq!(calls[1].1, vec![PersonStatus::Upright]);
        assert_eq!(calls[2].1, vec![PersonStatus::Falling]);
        assert_eq!(calls[4].1, vec![PersonStatus::Fallen]);
    }

    #[test]
    fn test_without_writer_skips_annotation() {
        let annotator = RecordingAnnotator::new();
        let calls = annotator.calls.clone();
        let mut uc = use_case(
            6,
            None,
            Box::new(ScriptedDetector::one_person(6, 0..6)),
            annotator,
        );
        let report = uc.execute(&metadata(6), Path::new("/tmp/out.mp4")).unwrap();
        assert_eq!(report.frames_processed, 6);
        assert_eq!(report.fall_count(), 1);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_closes_reader_and_writer() {
        let reader = StubReader::new(make_frames(2));
        let reader_closed = reader.closed.clone();
        let writer = StubWriter::new();
        let writer_closed = writer.closed.clone();

        let mut uc = AnalyzeVideoUseCase::new(
            Box::new(reader),
            Some(Box::new(writer)),
            Box::new(ScriptedDetector::empty()),
            monitor(),
            Box::new(RecordingAnnotator::new()),
            Box::new(ThreadedPipelineExecutor::new()),
            None,
            None,
        );
        uc.execute(&metadata(2), Path::new("/tmp/out.mp4")).unwrap();

        assert!(*reader_closed.lock().unwrap());
        assert!(*writer_closed.lock().unwrap());
    }

    #[test]
    fn test_detector_error_propagates_and_closes() {
        let reader = StubReader::new(make_frames(3));
        let reader_closed = reader.closed.clone();
        let writer = StubWriter::new();
        let writer_closed = writer.closed.clone();

        let mut uc = AnalyzeVideoUseCase::new(
            Box::new(reader),
            Some(Box::new(writer)),
            Box::new(FailingDetector),
            monitor(),
            Box::new(RecordingAnnotator::new()),
            Box::new(ThreadedPipelineExecutor::new()),
            None,
            None,
        );
        let err = uc
            .execute(&metadata(3), Path::new("/tmp/out.mp4"))
            .unwrap_err();
        assert!(err.to_string().contains("detector error"));
        assert!(*reader_closed.lock().unwrap());
        assert!(*writer_closed.lock().unwrap());
    }

    #[test]
    fn test_second_execute_fails() {
        let mut uc = use_case(
            1,
            None,
            Box::new(ScriptedDetector::empty()),
            RecordingAnnotator::new(),
        );
        uc.execute(&metadata(1), Path::new("/tmp/out.mp4")).unwrap();
        let err = uc
            .execute(&metadata(1), Path::new("/tmp/out.mp4"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::AlreadyExecuted)
        ));
    }

    #[test]
    fn test_cancel_via_on_progress() {
        let mut uc = AnalyzeVideoUseCase::new(
            Box::new(StubReader::new(make_frames(10))),
            None,
            Box::new(ScriptedDetector::empty()),
            monitor(),
            Box::new(RecordingAnnotator::new()),
            Box::new(ThreadedPipelineExecutor::new()),
            Some(Box::new(|current: usize, _total: usize| current < 3)),
            None,
        );
        let err = uc
            .execute(&metadata(10), Path::new("/tmp/out.mp4"))
            .unwrap_err();
        assert!(err.to_string().contains("Cancelled"));
    }

    #[test]
    fn test_progress_reports_each_frame() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut uc = AnalyzeVideoUseCase::new(
            Box::new(StubReader::new(make_frames(4))),
            None,
            Box::new(ScriptedDetector::empty()),
            monitor(),
            Box::new(RecordingAnnotator::new()),
            Box::new(ThreadedPipelineExecutor::new()),
            Some(Box::new(move |current: usize, total: usize| {
                sink.lock().unwrap().push((current, total));
                true
            })),
            None,
        );
        uc.execute(&metadata(4), Path::new("/tmp/out.mp4")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_cancellation_via_atomic_bool() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let writer = StubWriter::new();
        let written = writer.written.clone();

        let mut uc = AnalyzeVideoUseCase::new(
            Box::new(StubReader::new(make_frames(50))),
            Some(Box::new(writer)),
            Box::new(ScriptedDetector::empty()),
            monitor(),
            Box::new(RecordingAnnotator::new()),
            Box::new(ThreadedPipelineExecutor::new()),
            Some(Box::new(move |current: usize, _: usize| {
                if current == 5 {
                    flag.store(true, Ordering::Relaxed);
                }
                true
            })),
            Some(cancelled),
        );
        let report = uc.execute(&metadata(50), Path::new("/tmp/out.mp4")).unwrap();
        assert!(report.frames_processed < 50);
        assert!(written.lock().unwrap().len() < 50);
    }
}
