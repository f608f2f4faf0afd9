pub mod analysis_report;
pub mod analyze_video_use_case;
pub mod fall_detector;
pub mod infrastructure;
pub mod pipeline_executor;
#[cfg(test)]
pub(crate) mod test_support;
