//! Port stubs shared by the pipeline tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::fall::domain::fall_monitor::{PersonStatus, PersonStatusView};
use crate::shared::bbox::BBox;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

pub const SIZE: u32 = 64;

pub fn metadata(total_frames: usize) -> VideoMetadata {
    VideoMetadata {
        width: SIZE,
        height: SIZE,
        fps: 10.0,
        total_frames,
        codec: "stub".to_string(),
        source_path: None,
    }
}

pub fn make_frames(count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| Frame::filled(SIZE, SIZE, [100; 3], i))
        .collect()
}

pub struct StubReader {
    pub frames: Vec<Frame>,
    pub closed: Arc<Mutex<bool>>,
}

impl StubReader {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            closed: Arc::new(Mutex::new(false)),
        }
    }
}

impl VideoReader for StubReader {
    fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        Ok(metadata(self.frames.len()))
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        Box::new(self.frames.drain(..).map(Ok))
    }

    fn close(&mut self) {
        *self.closed.lock().unwrap() = true;
    }
}

pub struct StubWriter {
    pub written: Arc<Mutex<Vec<Frame>>>,
    pub opened_at: Arc<Mutex<Option<std::path::PathBuf>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl StubWriter {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            opened_at: Arc::new(Mutex::new(None)),
            closed: Arc::new(Mutex::new(false)),
        }
    }
}

impl VideoWriter for StubWriter {
    fn open(
        &mut self,
        path: &Path,
        _metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        *self.opened_at.lock().unwrap() = Some(path.to_path_buf());
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.written.lock().unwrap().push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Returns the detections listed for each frame index, none otherwise.
pub struct ScriptedDetector {
    pub results: HashMap<usize, Vec<PersonDetection>>,
}

impl ScriptedDetector {
    pub fn empty() -> Self {
        Self {
            results: HashMap::new(),
        }
    }

    /// One tracked person whose fall score is high on `fallen_frames`.
    pub fn one_person(frames: usize, fallen_frames: std::ops::Range<usize>) -> Self {
        let results = (0..frames)
            .map(|i| {
                let score = if fallen_frames.contains(&i) { 0.9 } else { 0.1 };
                (i, vec![person(score)])
            })
            .collect();
        Self { results }
    }
}

pub fn person(fall_score: f64) -> PersonDetection {
    PersonDetection::new(BBox::new(10.0, 10.0, 30.0, 50.0), 0.9)
        .with_fall_score(fall_score)
        .with_track_id(1)
}

impl PersonDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        Ok(self
            .results
            .get(&frame.index())
            .cloned()
            .unwrap_or_default())
    }
}

pub struct FailingDetector;

impl PersonDetector for FailingDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        Err("detector error".into())
    }
}

/// Records the statuses it was asked to draw.
pub struct RecordingAnnotator {
    pub calls: Arc<Mutex<Vec<(usize, Vec<PersonStatus>)>>>,
}

impl RecordingAnnotator {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FrameAnnotator for RecordingAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        people: &[PersonStatusView],
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.calls
            .lock()
            .unwrap()
            .push((frame.index(), people.iter().map(|p| p.status).collect()));
        Ok(())
    }
}
