use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::fall::domain::fall_event::FallEvent;
use crate::fall::domain::fall_monitor::FallMonitor;
use crate::pipeline::analysis_report::AnalysisReport;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;
type Detected = Result<(Frame, Vec<PersonDetection>), SendError>;

/// Runs each stage on its own thread.
///
/// Layout: `reader -> detect -> main [monitor + annotate] -> writer`.
/// The writer thread only exists when a writer is given.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Option<Box<dyn VideoWriter>>,
        detector: Box<dyn PersonDetector>,
        mut monitor: FallMonitor,
        annotator: Box<dyn FrameAnnotator>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<AnalysisReport, Box<dyn std::error::Error>> {
        let started = Instant::now();
        let cap = self.channel_capacity;

        let mut reader = reader;
        let writer = match writer {
            Some(mut w) => {
                if let Err(e) = w.open(output_path, metadata) {
                    reader.close();
                    return Err(e);
                }
                Some(w)
            }
            None => None,
        };

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Result<Frame, SendError>>(cap);
        let (detected_tx, detected_rx) = crossbeam_channel::bounded::<Detected>(cap);

        let reader_handle = spawn_reader(reader, frame_tx, config.cancelled.clone());
        let detect_handle = spawn_detector(detector, frame_rx, detected_tx, config.cancelled.clone());
        let (write_tx, writer_handle) = match writer {
            Some(w) => {
                let (tx, rx) = crossbeam_channel::bounded::<Frame>(cap);
                (Some(tx), Some(spawn_writer(w, rx)))
            }
            None => (None, None),
        };

        let mut events = Vec::new();
        let outcome = run_main_loop(
            detected_rx,
            write_tx.as_ref(),
            &mut monitor,
            &*annotator,
            metadata,
            &config,
            &mut events,
        );
        drop(write_tx);

        let (frames_processed, main_error) = match outcome {
            Ok(n) => (n, None),
            Err(e) => (0, Some(e)),
        };
        join_threads(reader_handle, detect_handle, writer_handle, main_error)?;

        let report = AnalysisReport::new(frames_processed, started.elapsed(), events);
        log::info!(
            "Processed {} frames at {:.1} fps, {} fall(s)",
            report.frames_processed,
            report.fps,
            report.fall_count()
        );
        Ok(report)
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: Sender<Result<Frame, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        for frame_result in reader.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            let failed = mapped.is_err();
            if frame_tx.send(mapped).is_err() || failed {
                break;
            }
        }
        reader.close();
        reader
    })
}

fn spawn_detector(
    mut detector: Box<dyn PersonDetector>,
    frame_rx: Receiver<Result<Frame, SendError>>,
    detected_tx: Sender<Detected>,
    cancelled: Arc<AtomicBool>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in frame_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let result = frame_result.and_then(|frame| match detector.detect(&frame) {
                Ok(people) => Ok((frame, people)),
                Err(e) => Err(format!("detection failed on frame {}: {e}", frame.index()).into()),
            });
            if detected_tx.send(result).is_err() {
                break;
            }
        }
    })
}

fn spawn_writer(
    mut writer: Box<dyn VideoWriter>,
    write_rx: Receiver<Frame>,
) -> JoinHandle<(Box<dyn VideoWriter>, Option<SendError>)> {
    std::thread::spawn(move || {
        for frame in write_rx {
            if let Err(e) = writer.write(&frame) {
                return (writer, Some(e.to_string().into()));
            }
        }
        (writer, None)
    })
}

/// Feeds detections through the monitor, annotates and forwards frames.
/// Returns the number of frames processed.
fn run_main_loop(
    detected_rx: Receiver<Detected>,
    write_tx: Option<&Sender<Frame>>,
    monitor: &mut FallMonitor,
    annotator: &dyn FrameAnnotator,
    metadata: &VideoMetadata,
    config: &PipelineConfig,
    events: &mut Vec<FallEvent>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let mut frames_processed = 0;

    for detected in detected_rx {
        if config.cancelled.load(Ordering::Relaxed) {
            log::info!("Analysis cancelled after {frames_processed} frames");
            break;
        }
        let (mut frame, people) = detected.map_err(|e| e.to_string())?;

        let timestamp = metadata.timestamp_of(frame.index());
        let assessment = monitor.observe(frame.index(), timestamp, &people);
        events.extend(assessment.events);

        if let Some(tx) = write_tx {
            annotator.annotate(&mut frame, &assessment.people)?;
            tx.send(frame)
                .map_err(|_| "writer stopped before the last frame")?;
        }

        frames_processed += 1;
        if let Some(ref callback) = config.on_progress {
            if !callback(frames_processed, metadata.total_frames) {
                return Err("Cancelled".into());
            }
        }
    }
    Ok(frames_processed)
}

/// Joins every stage and closes the writer. The first error wins.
fn join_threads(
    reader_handle: JoinHandle<Box<dyn VideoReader>>,
    detect_handle: JoinHandle<()>,
    writer_handle: Option<JoinHandle<(Box<dyn VideoWriter>, Option<SendError>)>>,
    mut first_error: Option<Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    match reader_handle.join() {
        Ok(mut r) => r.close(),
        Err(_) => set_if_none(&mut first_error, "reader thread panicked".into()),
    }

    if detect_handle.join().is_err() {
        set_if_none(&mut first_error, "detect thread panicked".into());
    }

    if let Some(handle) = writer_handle {
        match handle.join() {
            Ok((mut w, write_error)) => {
                if let Some(e) = write_error {
                    set_if_none(&mut first_error, e.to_string().into());
                }
                if let Err(e) = w.close() {
                    set_if_none(&mut first_error, e);
                }
            }
            Err(_) => set_if_none(&mut first_error, "writer thread panicked".into()),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
