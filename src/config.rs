use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::CycleError;
use crate::history::DEFAULT_CYCLE_LENGTH;
use crate::logging::LogConfig;
use crate::models::PhaseDurations;
use crate::prediction::PredictorConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application metadata
    pub metadata: ConfigMetadata,

    /// Forecast defaults
    #[serde(default)]
    pub prediction: PredictionSettings,

    /// Where phase history comes from
    #[serde(default)]
    pub source: SourceSettings,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// Forecast defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    /// Cycles to forecast when none is given on the command line
    pub cycles_ahead: u32,

    /// Fixed confidence for predictions; derived from history when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,

    /// Prefix of generated cycle ids
    pub id_prefix: String,

    /// Cycle length used by `predict` when none is given
    pub default_cycle_length: u32,

    /// Phase decomposition used by `predict` when none is given
    pub default_durations: PhaseDurations,
}

/// Phase history source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Base URL of the remote data supplier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Local history file used when `--file` is omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            prediction: PredictionSettings::default(),
            source: SourceSettings::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Default for PredictionSettings {
    fn default() -> Self {
        let predictor = PredictorConfig::default();

        PredictionSettings {
            cycles_ahead: 3,
            confidence: None,
            id_prefix: predictor.id_prefix,
            default_cycle_length: DEFAULT_CYCLE_LENGTH,
            default_durations: PhaseDurations::default(),
        }
    }
}

impl PredictionSettings {
    pub fn to_predictor_config(&self) -> PredictorConfig {
        PredictorConfig {
            id_prefix: self.id_prefix.clone(),
        }
    }

    /// Fill in missing explicit forecast parameters.
    ///
    /// Durations given without a cycle length imply their own total as the
    /// length; otherwise the configured defaults apply.
    pub fn cycle_parameters(
        &self,
        cycle_length: Option<i64>,
        durations: Option<PhaseDurations>,
    ) -> (i64, PhaseDurations) {
        match (cycle_length, durations) {
            (Some(length), Some(durations)) => (length, durations),
            (None, Some(durations)) => (i64::from(durations.total()), durations),
            (Some(length), None) => (length, self.default_durations),
            (None, None) => (
                i64::from(self.default_cycle_length),
                self.default_durations,
            ),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Dotted keys accepted by [`AppConfig::get`] and [`AppConfig::set`]
    pub const KEYS: [&'static str; 10] = [
        "prediction.cycles_ahead",
        "prediction.confidence",
        "prediction.id_prefix",
        "prediction.default_cycle_length",
        "prediction.default_durations",
        "source.base_url",
        "source.data_file",
        "logging.level",
        "logging.format",
        "logging.file_path",
    ];

    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cyclecast")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Unreadable config file, using defaults");
                Self::default()
            }
        }
    }

    /// Save configuration to default location
    pub fn save_default(&mut self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to_file(config_path)
    }

    /// Read a setting by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "prediction.cycles_ahead" => self.prediction.cycles_ahead.to_string(),
            "prediction.confidence" => self
                .prediction
                .confidence
                .map(|c| c.to_string())
                .unwrap_or_else(|| "auto".to_string()),
            "prediction.id_prefix" => self.prediction.id_prefix.clone(),
            "prediction.default_cycle_length" => self.prediction.default_cycle_length.to_string(),
            "prediction.default_durations" => {
                let d = &self.prediction.default_durations;
                format!("{},{},{},{}", d.menstrual, d.follicular, d.ovulation, d.luteal)
            }
            "source.base_url" => self.source.base_url.clone().unwrap_or_default(),
            "source.data_file" => self
                .source
                .data_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "logging.level" => self.logging.level.to_filter(),
            "logging.format" => format!("{:?}", self.logging.format).to_lowercase(),
            "logging.file_path" => self
                .logging
                .file_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => bail!("Unknown configuration key: {}", key),
        };

        Ok(value)
    }

    /// Update a setting by dotted key. An empty value clears optional settings.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match key {
            "prediction.cycles_ahead" => {
                self.prediction.cycles_ahead = value
                    .parse()
                    .with_context(|| format!("Invalid cycle count: {}", value))?;
            }
            "prediction.confidence" => {
                self.prediction.confidence = match value {
                    "" | "auto" => None,
                    v => Some(v.parse().with_context(|| format!("Invalid confidence: {}", v))?),
                };
            }
            "prediction.id_prefix" => self.prediction.id_prefix = value.to_string(),
            "prediction.default_cycle_length" => {
                self.prediction.default_cycle_length = value
                    .parse()
                    .with_context(|| format!("Invalid cycle length: {}", value))?;
            }
            "prediction.default_durations" => {
                self.prediction.default_durations = value.parse().map_err(|e: String| anyhow!(e))?;
            }
            "source.base_url" => self.source.base_url = optional(value),
            "source.data_file" => self.source.data_file = optional(value).map(PathBuf::from),
            "logging.level" => self.logging.level = value.parse().map_err(|e: String| anyhow!(e))?,
            "logging.format" => {
                self.logging.format = value.parse().map_err(|e: String| anyhow!(e))?
            }
            "logging.file_path" => self.logging.file_path = optional(value).map(PathBuf::from),
            _ => bail!("Unknown configuration key: {}", key),
        }

        Ok(())
    }

    /// Check settings for values the predictor would reject
    pub fn validate(&self) -> crate::error::Result<()> {
        let prediction = &self.prediction;

        if prediction.cycles_ahead == 0 {
            return Err(CycleError::Configuration(
                "prediction.cycles_ahead must be at least 1".to_string(),
            ));
        }
        if let Some(confidence) = prediction.confidence {
            if confidence > 100 {
                return Err(CycleError::Configuration(format!(
                    "prediction.confidence must be between 0 and 100, got {}",
                    confidence
                )));
            }
        }
        if prediction.id_prefix.trim().is_empty() {
            return Err(CycleError::Configuration(
                "prediction.id_prefix must not be empty".to_string(),
            ));
        }
        if prediction.default_durations.total() != prediction.default_cycle_length {
            return Err(CycleError::Configuration(format!(
                "prediction.default_durations sum to {} days but default_cycle_length is {}",
                prediction.default_durations.total(),
                prediction.default_cycle_length
            )));
        }
        if let Some(url) = &self.source.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CycleError::Configuration(format!(
                    "source.base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.prediction, deserialized.prediction);
        assert_eq!(config.logging, deserialized.logging);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let toml_str = r#"
            [metadata]
            version = "1.0"
            created_at = "2024-01-01T00:00:00Z"
            updated_at = "2024-01-01T00:00:00Z"

            [prediction]
            cycles_ahead = 6
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.prediction.cycles_ahead, 6);
        assert_eq!(config.prediction.id_prefix, "predicted");
        assert_eq!(config.source, SourceSettings::default());
        assert_eq!(config.logging, LogConfig::default());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original_config = AppConfig::default();
        original_config
            .set("source.base_url", "https://api.example.com")
            .unwrap();
        original_config.set("prediction.confidence", "70").unwrap();

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(
            loaded_config.source.base_url.as_deref(),
            Some("https://api.example.com")
        );
        assert_eq!(loaded_config.prediction.confidence, Some(70));
    }

    #[test]
    fn test_get_and_set() {
        let mut config = AppConfig::default();

        assert_eq!(config.get("prediction.confidence").unwrap(), "auto");
        assert_eq!(config.get("prediction.default_durations").unwrap(), "5,9,2,12");

        config.set("prediction.default_durations", "4,10,2,14").unwrap();
        config.set("prediction.default_cycle_length", "30").unwrap();
        config.set("logging.level", "debug").unwrap();
        config.set("source.data_file", "history.csv").unwrap();

        assert_eq!(config.prediction.default_durations.total(), 30);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.get("source.data_file").unwrap(), "history.csv");
        assert!(config.validate().is_ok());

        config.set("source.data_file", "").unwrap();
        assert_eq!(config.source.data_file, None);

        for key in AppConfig::KEYS {
            assert!(config.get(key).is_ok(), "key {} not readable", key);
        }
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = AppConfig::default();
        assert!(config.set("prediction.cycles_ahead", "many").is_err());
        assert!(config.set("prediction.default_durations", "5,9,2").is_err());
        assert!(config.set("logging.level", "loud").is_err());
        assert!(config.set("athlete.name", "x").is_err());
        assert!(config.get("athlete.name").is_err());
    }

    #[test]
    fn test_cycle_parameters_follow_given_durations() {
        let settings = PredictionSettings::default();
        let custom = PhaseDurations::new(4, 10, 2, 14);

        assert_eq!(settings.cycle_parameters(None, Some(custom)), (30, custom));
        assert_eq!(
            settings.cycle_parameters(None, None),
            (28, PhaseDurations::default())
        );
        assert_eq!(
            settings.cycle_parameters(Some(30), None),
            (30, PhaseDurations::default())
        );
        assert_eq!(settings.cycle_parameters(Some(31), Some(custom)), (31, custom));
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.prediction.default_cycle_length = 30;
        assert!(matches!(config.validate(), Err(CycleError::Configuration(_))));

        let mut config = AppConfig::default();
        config.prediction.cycles_ahead = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.prediction.confidence = Some(120);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.source.base_url = Some("ftp://example.com".to_string());
        assert!(config.validate().is_err());
    }
}
