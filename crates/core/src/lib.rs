//! Fall detection over video files.
//!
//! Frames are decoded with ffmpeg, people are detected with YOLO models run
//! through ONNX Runtime, a per-track monitor confirms falls over consecutive
//! frames, and confirmed falls are persisted as CV fall readings in
//! PostgreSQL.

pub mod annotation;
pub mod detection;
pub mod fall;
pub mod pipeline;
pub mod shared;
pub mod storage;
pub mod video;
