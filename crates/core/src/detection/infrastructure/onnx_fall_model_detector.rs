/// Detector for the trained fall model (ultralytics detect export).
///
/// Rows are `[cx, cy, w, h, score_0 .. score_{C-1}]`; the best class wins.
/// Every kept box becomes a `PersonDetection` whose `fall_score` is the
/// fall-class score, or zero for boxes of any other class.
use std::path::Path;

use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::frame::Frame;

use super::nms::{nms, Candidate, NMS_IOU_THRESH};
use super::yolo_session::{Letterbox, YoloSession};

pub struct OnnxFallModelDetector {
    session: YoloSession,
    num_classes: usize,
    fall_class: usize,
    confidence: f64,
}

impl OnnxFallModelDetector {
    pub fn new(
        model_path: &Path,
        num_classes: usize,
        fall_class: usize,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if fall_class >= num_classes {
            return Err(format!(
                "Fall class index {fall_class} out of range for {num_classes} classes"
            )
            .into());
        }
        Ok(Self {
            session: YoloSession::load(model_path)?,
            num_classes,
            fall_class,
            confidence,
        })
    }
}

impl PersonDetector for OnnxFallModelDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        let output = self.session.infer(frame)?;
        if let Some(row) = output.rows.first() {
            if row.len() != 4 + self.num_classes {
                log::warn!(
                    "Fall model rows have {} values but {} classes are configured",
                    row.len(),
                    self.num_classes
                );
            }
        }
        let boxes = parse_class_rows(
            &output.rows,
            &output.letterbox,
            self.fall_class,
            self.confidence,
        )
        .into_iter()
        .map(|d| PersonDetection {
            bbox: d.bbox.clamp_to(frame.width(), frame.height()),
            ..d
        })
        .collect();
        Ok(boxes)
    }
}

fn parse_class_rows(
    rows: &[Vec<f32>],
    lb: &Letterbox,
    fall_class: usize,
    confidence: f64,
) -> Vec<PersonDetection> {
    let candidates = rows
        .iter()
        .filter(|row| row.len() > 4)
        .filter_map(|row| {
            let (class_id, score) = row[4..]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
            let score = *score as f64;
            if score < confidence {
                return None;
            }
            let bbox = lb.box_to_frame(row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
            let fall_score = if class_id == fall_class { score } else { 0.0 };
            Some(Candidate {
                detection: PersonDetection::new(bbox, score).with_fall_score(fall_score),
                class_id,
            })
        })
        .collect();

    nms(candidates, NMS_IOU_THRESH)
        .into_iter()
        .map(|c| c.detection)
        .collect()
}
