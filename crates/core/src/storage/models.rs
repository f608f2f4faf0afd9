use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::fall::domain::fall_reading::{FallReading, NewFallReading};
use crate::shared::bbox::BBox;
use crate::storage::schema::cv_fall_readings;

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = cv_fall_readings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FallReadingRow {
    pub id: i32,
    pub video_path: String,
    pub track_id: i32,
    pub start_frame: i64,
    pub frame_index: i64,
    pub timestamp_secs: f64,
    pub confidence: f64,
    pub bbox_x1: f64,
    pub bbox_y1: f64,
    pub bbox_x2: f64,
    pub bbox_y2: f64,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cv_fall_readings)]
pub struct NewFallReadingRow<'a> {
    pub video_path: &'a str,
    pub track_id: i32,
    pub start_frame: i64,
    pub frame_index: i64,
    pub timestamp_secs: f64,
    pub confidence: f64,
    pub bbox_x1: f64,
    pub bbox_y1: f64,
    pub bbox_x2: f64,
    pub bbox_y2: f64,
    pub source: &'a str,
    pub recorded_at: DateTime<Utc>,
}

impl<'a> NewFallReadingRow<'a> {
    pub fn new(reading: &'a NewFallReading, recorded_at: DateTime<Utc>) -> Self {
        Self {
            video_path: &reading.video_path,
            track_id: reading.track_id as i32,
            start_frame: reading.start_frame as i64,
            frame_index: reading.frame_index as i64,
            timestamp_secs: reading.timestamp_secs,
            confidence: reading.confidence,
            bbox_x1: reading.bbox.x1,
            bbox_y1: reading.bbox.y1,
            bbox_x2: reading.bbox.x2,
            bbox_y2: reading.bbox.y2,
            source: &reading.source,
            recorded_at,
        }
    }
}

impl From<FallReadingRow> for FallReading {
    fn from(row: FallReadingRow) -> Self {
        FallReading {
            id: row.id,
            video_path: row.video_path,
            track_id: row.track_id.max(0) as u32,
            start_frame: row.start_frame.max(0) as u64,
            frame_index: row.frame_index.max(0) as u64,
            timestamp_secs: row.timestamp_secs,
            confidence: row.confidence,
            bbox: BBox::new(row.bbox_x1, row.bbox_y1, row.bbox_x2, row.bbox_y2),
            source: row.source,
            recorded_at: row.recorded_at,
        }
    }
}
