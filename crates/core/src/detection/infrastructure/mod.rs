pub mod execution_provider;
pub mod fused_person_detector;
pub mod model_resolver;
mod nms;
pub mod onnx_fall_model_detector;
pub mod onnx_pose_detector;
pub mod person_tracker;
pub mod skip_frame_detector;
pub mod tracked_person_detector;
pub mod yolo_session;
