/// Person detector backed by a YOLO pose model (e.g. `yolo11n-pose`).
///
/// Each output row is `[cx, cy, w, h, conf, 17 x (x, y, conf)]` in letterbox
/// coordinates. Rows below the confidence threshold are dropped, the rest
/// go through NMS and are mapped back onto the source frame.
use std::path::Path;

use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::detection::domain::pose::{Keypoint, Pose, NUM_KEYPOINTS};
use crate::shared::frame::Frame;

use super::nms::{nms, Candidate, NMS_IOU_THRESH};
use super::yolo_session::{Letterbox, YoloSession};

/// Values per row: 4 box + 1 score + 17 keypoints x 3.
const POSE_ROW_LEN: usize = 5 + NUM_KEYPOINTS * 3;

pub struct OnnxPoseDetector {
    session: YoloSession,
    confidence: f64,
}

impl OnnxPoseDetector {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: YoloSession::load(model_path)?,
            confidence,
        })
    }
}

impl PersonDetector for OnnxPoseDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        let output = self.session.infer(frame)?;
        if let Some(row) = output.rows.first() {
            if row.len() < POSE_ROW_LEN {
                return Err(format!(
                    "Pose model rows have {} values, expected {POSE_ROW_LEN}; is this a pose export?",
                    row.len()
                )
                .into());
            }
        }
        let people = parse_pose_rows(&output.rows, &output.letterbox, self.confidence)
            .into_iter()
            .map(|p| PersonDetection {
                bbox: p.bbox.clamp_to(frame.width(), frame.height()),
                ..p
            })
            .collect();
        Ok(people)
    }
}

fn parse_pose_rows(rows: &[Vec<f32>], lb: &Letterbox, confidence: f64) -> Vec<PersonDetection> {
    let candidates = rows
        .iter()
        .filter(|row| row.len() >= POSE_ROW_LEN)
        .filter(|row| row[4] as f64 >= confidence)
        .map(|row| {
            let bbox = lb.box_to_frame(row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
            let mut keypoints = [Keypoint::default(); NUM_KEYPOINTS];
            for (k, kp) in keypoints.iter_mut().enumerate() {
                let base = 5 + k * 3;
                let (x, y) = lb.to_frame(row[base] as f64, row[base + 1] as f64);
                *kp = Keypoint {
                    x,
                    y,
                    confidence: row[base + 2] as f64,
                };
            }
            Candidate {
                detection: PersonDetection::new(bbox, row[4] as f64).with_pose(Pose::new(keypoints)),
                class_id: 0,
            }
        })
        .collect();

    nms(candidates, NMS_IOU_THRESH)
        .into_iter()
        .map(|c| c.detection)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::pose::KeypointKind;
    use approx::assert_relative_eq;

    fn identity() -> Letterbox {
        Letterbox {
            scale: 1.0,
            pad_x: 0,
            pad_y: 0,
        }
    }

    fn row(cx: f32, cy: f32, w: f32, h: f32, conf: f32) -> Vec<f32> {
        let mut r = vec![cx, cy, w, h, conf];
        for k in 0..NUM_KEYPOINTS {
            r.extend_from_slice(&[cx + k as f32, cy + k as f32, 0.9]);
        }
        r
    }

    #[test]
    fn test_parses_box_and_keypoints() {
        let people = parse_pose_rows(&[row(100.0, 100.0, 40.0, 120.0, 0.8)], &identity(), 0.25);
        assert_eq!(people.len(), 1);
        let p = &people[0];
        assert_relative_eq!(p.bbox.x1, 80.0);
        assert_relative_eq!(p.bbox.y2, 160.0);
        let pose = p.pose.as_ref().unwrap();
        let hip = pose.get(KeypointKind::LeftHip);
        assert_relative_eq!(hip.x, 111.0);
        assert!(hip.is_visible());
        assert!(p.fall_score.is_none());
    }

    #[test]
    fn test_filters_low_confidence() {
        let people = parse_pose_rows(&[row(100.0, 100.0, 40.0, 120.0, 0.1)], &identity(), 0.25);
        assert!(people.is_empty());
    }

    #[test]
    fn test_maps_through_letterbox() {
        let lb = Letterbox {
            scale: 2.0,
            pad_x: 0,
            pad_y: 80,
        };
        let people = parse_pose_rows(&[row(100.0, 180.0, 40.0, 40.0, 0.9)], &lb, 0.25);
        assert_relative_eq!(people[0].bbox.x1, 40.0);
        assert_relative_eq!(people[0].bbox.y1, 40.0);
    }

    #[test]
    fn test_overlapping_rows_are_suppressed() {
        let people = parse_pose_rows(
            &[
                row(100.0, 100.0, 40.0, 120.0, 0.7),
                row(102.0, 101.0, 40.0, 120.0, 0.9),
            ],
            &identity(),
            0.25,
        );
        assert_eq!(people.len(), 1);
        assert_relative_eq!(people[0].confidence, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_short_rows_are_ignored() {
        let people = parse_pose_rows(&[vec![1.0, 2.0, 3.0, 4.0, 0.9]], &identity(), 0.25);
        assert!(people.is_empty());
    }
}
