use crate::detection::domain::person_detection::PersonDetection;

/// NMS IoU threshold.
pub(super) const NMS_IOU_THRESH: f64 = 0.45;

/// A decoded model row before suppression.
#[derive(Clone, Debug)]
pub(super) struct Candidate {
    pub detection: PersonDetection,
    pub class_id: usize,
}

/// Greedy class-aware NMS: sort by confidence descending, suppress
/// same-class boxes that overlap a kept one by more than `iou_thresh`.
pub(super) fn nms(mut candidates: Vec<Candidate>, iou_thresh: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.detection
            .confidence
            .partial_cmp(&a.detection.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = keep.iter().any(|k| {
            k.class_id == candidate.class_id
                && k.detection.bbox.iou(&candidate.detection.bbox) > iou_thresh
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}
