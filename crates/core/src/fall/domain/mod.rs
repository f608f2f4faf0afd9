pub mod fall_event;
pub mod fall_monitor;
pub mod fall_reading;
pub mod posture_classifier;
pub mod reading_repository;
