use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fall::domain::posture_classifier::FallStrategy;
use crate::shared::constants::{
    APP_DIR_NAME, BASE_MODEL_NAME, DEFAULT_CLASS_NAMES, DEFAULT_FALL_CLASS,
    DEFAULT_MIN_FALL_FRAMES, DEFAULT_RECOVERY_FRAMES, TRACKER_MAX_LOST, TRAINED_MODEL_NAME,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Tunables for one analysis run, stored as JSON.
///
/// Every field has a default, so a settings file only needs the keys it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub trained_model: PathBuf,
    pub base_model: PathBuf,
    pub trained_model_url: Option<String>,
    pub base_model_url: Option<String>,
    /// Directory of bundled model files, searched after the model cache.
    pub models_dir: Option<PathBuf>,
    pub class_names: Vec<String>,
    pub fall_class: String,
    pub strategy: FallStrategy,
    /// Minimum detection confidence for both models.
    pub confidence: f64,
    pub model_threshold: f64,
    pub pose_threshold: f64,
    pub min_fall_frames: usize,
    pub recovery_frames: usize,
    pub tracker_max_lost: usize,
    /// Run inference every Nth frame (1 = every frame).
    pub skip_frames: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            trained_model: PathBuf::from(TRAINED_MODEL_NAME),
            base_model: PathBuf::from(BASE_MODEL_NAME),
            trained_model_url: None,
            base_model_url: None,
            models_dir: None,
            class_names: DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            fall_class: DEFAULT_FALL_CLASS.to_string(),
            strategy: FallStrategy::Combined,
            confidence: 0.25,
            model_threshold: 0.5,
            pose_threshold: 0.6,
            min_fall_frames: DEFAULT_MIN_FALL_FRAMES,
            recovery_frames: DEFAULT_RECOVERY_FRAMES,
            tracker_max_lost: TRACKER_MAX_LOST,
            skip_frames: 1,
        }
    }
}

impl AnalysisSettings {
    /// `<config dir>/FallWatch/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate(path)?;
        Ok(settings)
    }

    /// Loads `path` when given. Otherwise loads the default settings file if
    /// one exists, falling back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load_from(&default),
            _ => Ok(Self::default()),
        }
    }

    /// Index of `fall_class` within `class_names`.
    pub fn fall_class_index(&self) -> Option<usize> {
        self.class_names.iter().position(|c| c == &self.fall_class)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        if self.fall_class_index().is_none() {
            return Err(invalid(format!(
                "fall_class '{}' is not one of {:?}",
                self.fall_class, self.class_names
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )));
        }
        if self.skip_frames == 0 {
            return Err(invalid("skip_frames must be >= 1".to_string()));
        }
        if self.min_fall_frames == 0 {
            return Err(invalid("min_fall_frames must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_point_at_bundled_model_names() {
        let s = AnalysisSettings::default();
        assert_eq!(s.trained_model, PathBuf::from(TRAINED_MODEL_NAME));
        assert_eq!(s.base_model, PathBuf::from(BASE_MODEL_NAME));
        assert_eq!(s.fall_class_index(), Some(0));
        assert_eq!(s.strategy, FallStrategy::Combined);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "min_fall_frames": 3, "strategy": "model" }"#).unwrap();

        let s = AnalysisSettings::load_from(&path).unwrap();
        assert_eq!(s.min_fall_frames, 3);
        assert_eq!(s.strategy, FallStrategy::ModelOnly);
        assert_eq!(s.recovery_frames, DEFAULT_RECOVERY_FRAMES);
    }

    #[test]
    fn test_models_dir_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "models_dir": "/opt/fallwatch/models" }"#).unwrap();
        let s = AnalysisSettings::load_from(&path).unwrap();
        assert_eq!(s.models_dir, Some(PathBuf::from("/opt/fallwatch/models")));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = AnalysisSettings::load_from(Path::new("/nonexistent/settings.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = AnalysisSettings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_fall_class_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "fall_class": "tumble" }"#).unwrap();
        let err = AnalysisSettings::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("tumble"));
    }

    #[test]
    fn test_zero_skip_frames_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "skip_frames": 0 }"#).unwrap();
        assert!(matches!(
            AnalysisSettings::load_from(&path),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
