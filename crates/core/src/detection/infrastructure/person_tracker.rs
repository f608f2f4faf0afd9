/// Simplified ByteTrack multi-person tracker.
///
/// Two-stage association: high-confidence detections are matched first,
/// then low-confidence detections fill remaining unmatched tracks. Someone
/// mid-fall often drops in confidence for a few frames, and the second stage
/// keeps their id stable through that dip.
use std::collections::HashSet;

use crate::shared::bbox::BBox;

const HIGH_THRESH: f64 = 0.5;
const MATCH_THRESH: f64 = 0.3;

/// A matched track for the current frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackAssignment {
    pub track_id: u32,
    pub det_index: usize,
}

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: BBox,
    frames_lost: usize,
    det_index: Option<usize>,
}

pub struct PersonTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl PersonTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Associates this frame's detections with existing tracks.
    ///
    /// `detections` are `(bbox, score)` pairs; the result maps each matched
    /// track to the index of its detection. Unmatched low-confidence
    /// detections get no track.
    pub fn update(&mut self, detections: &[(BBox, f64)]) -> Vec<TrackAssignment> {
        for track in &mut self.tracks {
            track.det_index = None;
        }

        let (high, low): (Vec<usize>, Vec<usize>) =
            (0..detections.len()).partition(|&i| detections[i].1 >= HIGH_THRESH);

        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let matched_high = self.associate(&all_tracks, &high, detections);

        let unmatched_tracks: Vec<usize> = (0..self.tracks.len())
            .filter(|&t| self.tracks[t].det_index.is_none())
            .collect();
        self.associate(&unmatched_tracks, &low, detections);

        let num_existing = self.tracks.len();
        for &di in &high {
            if !matched_high.contains(&di) {
                self.tracks.push(TrackState {
                    id: self.next_id,
                    bbox: detections[di].0,
                    frames_lost: 0,
                    det_index: Some(di),
                });
                self.next_id += 1;
            }
        }

        for track in self.tracks.iter_mut().take(num_existing) {
            if track.det_index.is_none() {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        // Lost tracks stay around for re-identification but are not reported
        self.tracks
            .iter()
            .filter_map(|t| {
                t.det_index.map(|det_index| TrackAssignment {
                    track_id: t.id,
                    det_index,
                })
            })
            .collect()
    }

    /// Greedy IoU matching of `track_indices` against `det_indices`; returns
    /// the detections that were matched.
    fn associate(
        &mut self,
        track_indices: &[usize],
        det_indices: &[usize],
        detections: &[(BBox, f64)],
    ) -> HashSet<usize> {
        let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
        for &ti in track_indices {
            for &di in det_indices {
                let iou = self.tracks[ti].bbox.iou(&detections[di].0);
                if iou >= MATCH_THRESH {
                    pairs.push((ti, di, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut used_tracks = HashSet::new();
        let mut used_dets = HashSet::new();
        for (ti, di, _) in pairs {
            if used_tracks.contains(&ti) || used_dets.contains(&di) {
                continue;
            }
            used_tracks.insert(ti);
            used_dets.insert(di);
            let track = &mut self.tracks[ti];
            track.bbox = detections[di].0;
            track.frames_lost = 0;
            track.det_index = Some(di);
        }
        used_dets
    }
}
