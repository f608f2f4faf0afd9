use std::sync::Mutex;

use chrono::Utc;

use crate::fall::domain::fall_reading::{FallReading, NewFallReading};
use crate::fall::domain::reading_repository::FallReadingRepository;

/// Process-local repository used when no database is configured.
#[derive(Default)]
pub struct InMemoryReadingRepository {
    readings: Mutex<Vec<FallReading>>,
}

impl InMemoryReadingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<FallReading>>, Box<dyn std::error::Error>> {
        self.readings
            .lock()
            .map_err(|_| "reading store lock poisoned".into())
    }
}

impl FallReadingRepository for InMemoryReadingRepository {
    fn insert_readings(
        &self,
        readings: &[NewFallReading],
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let mut stored = self.lock()?;
        let now = Utc::now();
        for reading in readings {
            let id = stored.len() as i32 + 1;
            stored.push(reading.clone().into_reading(id, now));
        }
        Ok(readings.len())
    }

    fn get_all_cv_fall_readings(&self) -> Result<Vec<FallReading>, Box<dyn std::error::Error>> {
        Ok(self.lock()?.clone())
    }

    fn get_readings_for_video(
        &self,
        video_path: &str,
    ) -> Result<Vec<FallReading>, Box<dyn std::error::Error>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| r.video_path == video_path)
            .cloned()
            .collect())
    }
}
