//! Pipeline configuration

use std::path::{Path, PathBuf};

use adas::AdasConfig;
use alerting::AlertConfig;
use camera_capture::SourceConfig;
use ::config::{Config, Environment, File};
use entitlements::EntitlementConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::PipelineError;

/// Prefix of environment overrides, e.g. `ROADSENSE__SOURCE__PATH`
pub const ENV_PREFIX: &str = "ROADSENSE";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frame input
    pub source: SourceConfig,

    /// Perception settings
    pub adas: AdasConfig,

    /// Alert cooldown and speech output
    pub alert: AlertConfig,

    /// Subscription documents
    pub entitlements: EntitlementConfig,

    /// Trained sign classifier (ONNX)
    pub model_path: PathBuf,

    /// Label names, one per line; the built-in set is used when unset
    pub labels_path: Option<PathBuf>,

    /// Per-frame sign position log
    pub event_log_path: PathBuf,

    /// Parent directory of recording sessions
    pub recording_dir: PathBuf,

    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            adas: AdasConfig::default(),
            alert: AlertConfig::default(),
            entitlements: EntitlementConfig::default(),
            model_path: PathBuf::from("data_svm.onnx"),
            labels_path: None,
            event_log_path: PathBuf::from("Output.txt"),
            recording_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl PipelineConfig {
    /// Load from an optional TOML file plus `ROADSENSE__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.source.width, 720);
        assert_eq!(config.source.height, 480);
        assert_eq!(config.alert.cooldown_seconds, 7);
        assert_eq!(config.adas.sign.label_limit, 8);
        assert_eq!(config.adas.lane.warning_threshold, 0.2);
        assert_eq!(config.event_log_path, PathBuf::from("Output.txt"));
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roadsense.toml");
        std::fs::write(
            &path,
            r#"
model_path = "models/signs.onnx"
log_format = "json"

[source]
path = "/data/drive01"
fps = 25

[alert]
cooldown_seconds = 3
speech_command = "espeak"

[adas.sign]
circle_similarity = 0.7
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.model_path, PathBuf::from("models/signs.onnx"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.source.path, "/data/drive01");
        assert_eq!(config.source.fps, 25);
        assert_eq!(config.source.width, 720);
        assert_eq!(config.alert.cooldown_seconds, 3);
        assert_eq!(config.alert.speech_command.as_deref(), Some("espeak"));
        assert!((config.adas.sign.circle_similarity - 0.7).abs() < 1e-6);
        assert_eq!(config.adas.sign.min_component_size, 300);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PipelineConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
