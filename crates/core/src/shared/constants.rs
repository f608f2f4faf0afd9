/// Base pose model (ultralytics YOLO11 nano pose, ONNX export).
pub const BASE_MODEL_NAME: &str = "yolo11n-pose.onnx";

/// Fall model fine-tuned on fall footage (ONNX export of the training run's best weights).
pub const TRAINED_MODEL_NAME: &str = "fall_best.onnx";

/// Class labels of the trained model, in output order.
pub const DEFAULT_CLASS_NAMES: &[&str] = &["fall", "no_fall"];
pub const DEFAULT_FALL_CLASS: &str = "fall";

/// Max frames a track can be lost before removal (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

/// Consecutive fallen frames before a fall is confirmed.
pub const DEFAULT_MIN_FALL_FRAMES: usize = 8;

/// Consecutive upright frames before a confirmed track can fall again.
pub const DEFAULT_RECOVERY_FRAMES: usize = 15;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "m4v", "webm"];

/// Folder name used under the platform config and cache directories.
pub const APP_DIR_NAME: &str = "FallWatch";
