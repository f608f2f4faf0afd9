use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use thiserror::Error;

use crate::fall::domain::fall_reading::{FallReading, NewFallReading};
use crate::fall::domain::reading_repository::FallReadingRepository;
use crate::shared::settings::ConfigError;
use crate::storage::database_config::DatabaseConfig;
use crate::storage::models::{FallReadingRow, NewFallReadingRow};
use crate::storage::schema::cv_fall_readings;

const CREATE_TABLE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS cv_fall_readings (
    id SERIAL PRIMARY KEY,
    video_path TEXT NOT NULL,
    track_id INTEGER NOT NULL,
    start_frame BIGINT NOT NULL,
    frame_index BIGINT NOT NULL,
    timestamp_secs DOUBLE PRECISION NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    bbox_x1 DOUBLE PRECISION NOT NULL,
    bbox_y1 DOUBLE PRECISION NOT NULL,
    bbox_x2 DOUBLE PRECISION NOT NULL,
    bbox_y2 DOUBLE PRECISION NOT NULL,
    source TEXT NOT NULL,
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not connect to database: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

/// PostgreSQL-backed store for fall readings.
///
/// Holds a single connection; calls from different threads are serialised.
pub struct PsqlManager {
    conn: Mutex<PgConnection>,
}

impl PsqlManager {
    /// Reads the JSON database config at `path` and connects.
    pub fn from_config_path(path: &Path) -> Result<Self, DatabaseError> {
        let config = DatabaseConfig::from_path(path)?;
        Self::new(&config)
    }

    /// Connects and makes sure the readings table exists.
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let conn = PgConnection::establish(&config.connection_string())?;
        log::info!("Connected to {}", config.redacted());
        let manager = Self {
            conn: Mutex::new(conn),
        };
        manager.ensure_schema()?;
        Ok(manager)
    }

    pub fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let mut conn = self.lock()?;
        diesel::sql_query(CREATE_TABLE_SQL).execute(&mut *conn)?;
        Ok(())
    }

    pub fn insert(&self, readings: &[NewFallReading]) -> Result<usize, DatabaseError> {
        if readings.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let rows: Vec<NewFallReadingRow<'_>> = readings
            .iter()
            .map(|r| NewFallReadingRow::new(r, now))
            .collect();

        let mut conn = self.lock()?;
        let written = conn.transaction(|conn| {
            diesel::insert_into(cv_fall_readings::table)
                .values(&rows)
                .execute(conn)
        })?;
        log::debug!("Inserted {written} fall readings");
        Ok(written)
    }

    pub fn all_readings(&self) -> Result<Vec<FallReading>, DatabaseError> {
        let mut conn = self.lock()?;
        let rows: Vec<FallReadingRow> = cv_fall_readings::table
            .order(cv_fall_readings::id.asc())
            .select(FallReadingRow::as_select())
            .load(&mut *conn)?;
        Ok(rows.into_iter().map(FallReading::from).collect())
    }

    pub fn readings_for_video(&self, video_path: &str) -> Result<Vec<FallReading>, DatabaseError> {
        let mut conn = self.lock()?;
        let rows: Vec<FallReadingRow> = cv_fall_readings::table
            .filter(cv_fall_readings::video_path.eq(video_path))
            .order(cv_fall_readings::id.asc())
            .select(FallReadingRow::as_select())
            .load(&mut *conn)?;
        Ok(rows.into_iter().map(FallReading::from).collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, PgConnection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl FallReadingRepository for PsqlManager {
    fn insert_readings(
        &self,
        readings: &[NewFallReading],
    ) -> Result<usize, Box<dyn std::error::Error>> {
        Ok(self.insert(readings)?)
    }

    fn get_all_cv_fall_readings(&self) -> Result<Vec<FallReading>, Box<dyn std::error::Error>> {
        Ok(self.all_readings()?)
    }

    fn get_readings_for_video(
        &self,
        video_path: &str,
    ) -> Result<Vec<FallReading>, Box<dyn std::error::Error>> {
        Ok(self.readings_for_video(video_path)?)
    }
}
