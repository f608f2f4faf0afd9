pub mod person_detection;
pub mod person_detector;
pub mod pose;
