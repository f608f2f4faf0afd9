use crate::detection::domain::person_detection::PersonDetection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::frame::Frame;

/// Minimum IoU for a fall-model box to be attributed to a pose person.
pub const FUSION_IOU_THRESH: f64 = 0.3;

/// Runs the pose model and the trained fall model on the same frame and
/// merges their outputs.
///
/// Each pose person takes the `fall_score` of the fall-model box it overlaps
/// most. Fall-model boxes no person claimed are passed through without a
/// pose, so someone lying flat that the pose model misses is still seen.
pub struct FusedPersonDetector {
    pose: Box<dyn PersonDetector>,
    model: Box<dyn PersonDetector>,
}

impl FusedPersonDetector {
    pub fn new(pose: Box<dyn PersonDetector>, model: Box<dyn PersonDetector>) -> Self {
        Self { pose, model }
    }
}

impl PersonDetector for FusedPersonDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        let people = self.pose.detect(frame)?;
        let boxes = self.model.detect(frame)?;
        Ok(fuse(people, boxes))
    }
}

fn fuse(mut people: Vec<PersonDetection>, boxes: Vec<PersonDetection>) -> Vec<PersonDetection> {
    let mut claimed = vec![false; boxes.len()];

    for person in &mut people {
        let best = boxes
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(i, b)| (i, b.bbox.iou(&person.bbox)))
            .filter(|(_, iou)| *iou >= FUSION_IOU_THRESH)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((i, _)) = best {
            claimed[i] = true;
            person.fall_score = boxes[i].fall_score;
        }
    }

    people.extend(
        boxes
            .into_iter()
            .zip(claimed)
            .filter(|(_, was_claimed)| !was_claimed)
            .map(|(b, _)| b),
    );
    people
}
