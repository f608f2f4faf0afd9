use std::fmt;

use chrono::{DateTime, Utc};

use crate::fall::domain::fall_event::FallEvent;
use crate::shared::bbox::BBox;

/// A stored fall reading.
#[derive(Debug, Clone, PartialEq)]
pub struct FallReading {
    pub id: i32,
    pub video_path: String,
    pub track_id: u32,
    pub start_frame: u64,
    pub frame_index: u64,
    pub timestamp_secs: f64,
    pub confidence: f64,
    pub bbox: BBox,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

impl fmt::Display for FallReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} track {} fell at {:.2}s (frames {}-{}) confidence {:.2} via {} box [{:.0}, {:.0}, {:.0}, {:.0}] recorded {}",
            self.id,
            self.video_path,
            self.track_id,
            self.timestamp_secs,
            self.start_frame,
            self.frame_index,
            self.confidence,
            self.source,
            self.bbox.x1,
            self.bbox.y1,
            self.bbox.x2,
            self.bbox.y2,
            self.recorded_at.to_rfc3339(),
        )
    }
}

/// A reading that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFallReading {
    pub video_path: String,
    pub track_id: u32,
    pub start_frame: u64,
    pub frame_index: u64,
    pub timestamp_secs: f64,
    pub confidence: f64,
    pub bbox: BBox,
    pub source: String,
}

impl NewFallReading {
    pub fn from_event(event: &FallEvent, video_path: &str) -> Self {
        Self {
            video_path: video_path.to_string(),
            track_id: event.track_id,
            start_frame: event.start_frame as u64,
            frame_index: event.confirmed_frame as u64,
            timestamp_secs: event.timestamp_secs,
            confidence: event.confidence,
            bbox: event.bbox,
            source: event.source.as_str().to_string(),
        }
    }

    /// Completes the record with the id and time assigned on insert.
    pub fn into_reading(self, id: i32, recorded_at: DateTime<Utc>) -> FallReading {
        FallReading {
            id,
            video_path: self.video_path,
            track_id: self.track_id,
            start_frame: self.start_frame,
            frame_index: self.frame_index,
            timestamp_secs: self.timestamp_secs,
            confidence: self.confidence,
            bbox: self.bbox,
            source: self.source,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fall::domain::posture_classifier::EvidenceSource;
    use chrono::TimeZone;

    fn event() -> FallEvent {
        FallEvent {
            track_id: 3,
            start_frame: 40,
            confirmed_frame: 48,
            timestamp_secs: 1.6,
            confidence: 0.87,
            bbox: BBox::new(10.0, 20.0, 110.0, 80.0),
            source: EvidenceSource::Combined,
        }
    }

    #[test]
    fn test_from_event_copies_fields() {
        let r = NewFallReading::from_event(&event(), "clips/a.mp4");
        assert_eq!(r.video_path, "clips/a.mp4");
        assert_eq!(r.track_id, 3);
        assert_eq!(r.start_frame, 40);
        assert_eq!(r.frame_index, 48);
        assert_eq!(r.source, "combined");
        assert_eq!(r.bbox, BBox::new(10.0, 20.0, 110.0, 80.0));
    }

    #[test]
    fn test_display_is_single_line() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let reading = NewFallReading::from_event(&event(), "clips/a.mp4").into_reading(1, at);
        let line = reading.to_string();
        assert!(!line.contains('\n'));
        assert!(line.starts_with("#1 clips/a.mp4 track 3 fell at 1.60s"));
        assert!(line.contains("via combined"));
        assert!(line.contains("2024-05-01T12:00:00+00:00"));
    }
}
