//! Configuration schema

use crate::error::{AppError, Result};
use aitask_core::transform::{Chunking, SmoothConfig};
use aitask_core::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding `logging.level`
pub const LOG_LEVEL_ENV: &str = "AITASK_LOG";

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Enhance task configuration
    pub enhance: EnhanceConfig,

    /// Title task configuration
    pub title: TitleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "full"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Text pacing for a task's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// "word", "line", "character", or a regular expression
    pub chunking: String,

    /// Pause between chunks, in milliseconds
    pub delay_ms: u64,
}

impl SmoothingConfig {
    fn with_delay(delay_ms: u64) -> Self {
        Self {
            chunking: "word".to_string(),
            delay_ms,
        }
    }

    /// Build the transform configuration
    pub fn to_smooth_config(&self) -> Result<SmoothConfig> {
        let chunking = Chunking::parse(&self.chunking).map_err(|e| AppError::config(e.to_string()))?;
        Ok(SmoothConfig {
            chunking,
            delay: Duration::from_millis(self.delay_ms),
        })
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self::with_delay(10)
    }
}

/// Early validation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Trimmed characters required before the first check
    pub min_chars: usize,

    /// Characters after which output streams without further checks
    pub max_chars: usize,

    /// Total attempts, including the first
    pub max_retries: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        let defaults = ValidationConfig::default();
        Self {
            min_chars: defaults.min_chars,
            max_chars: defaults.max_chars,
            max_retries: defaults.max_retries,
        }
    }
}

impl From<ValidationSettings> for ValidationConfig {
    fn from(settings: ValidationSettings) -> Self {
        Self {
            min_chars: settings.min_chars,
            max_chars: settings.max_chars,
            max_retries: settings.max_retries,
        }
    }
}

/// Enhance task configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Output before the first occurrence of this marker is dropped
    pub marker: String,

    /// Ask the model for a section outline when no template is given
    pub analyze_structure: bool,

    /// Maximum model steps in the tool loop
    pub max_steps: usize,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Early validation of the note's first line
    pub validation: ValidationSettings,

    /// Output pacing
    pub smoothing: SmoothingConfig,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            marker: "#".to_string(),
            analyze_structure: true,
            max_steps: aitask_core::DEFAULT_MAX_STEPS,
            temperature: None,
            validation: ValidationSettings::default(),
            smoothing: SmoothingConfig::with_delay(30),
        }
    }
}

/// Title task configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Output pacing
    pub smoothing: SmoothingConfig,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            smoothing: SmoothingConfig::default(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["compact", "pretty", "full"];

impl AppConfig {
    /// Apply environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.logging.level = level.trim().to_lowercase();
            }
        }
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(AppError::config(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(AppError::config(format!(
                "logging.format must be one of {}, got '{}'",
                LOG_FORMATS.join(", "),
                self.logging.format
            )));
        }

        let validation = &self.enhance.validation;
        if validation.min_chars > validation.max_chars {
            return Err(AppError::config(format!(
                "enhance.validation.min_chars ({}) exceeds max_chars ({})",
                validation.min_chars, validation.max_chars
            )));
        }
        if validation.max_retries == 0 {
            return Err(AppError::config("enhance.validation.max_retries must be at least 1"));
        }
        if self.enhance.max_steps == 0 {
            return Err(AppError::config("enhance.max_steps must be at least 1"));
        }
        if self.enhance.marker.is_empty() {
            return Err(AppError::config("enhance.marker must not be empty"));
        }

        self.enhance.smoothing.to_smooth_config()?;
        self.title.smoothing.to_smooth_config()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.enhance.marker, "#");
        assert_eq!(config.enhance.smoothing.delay_ms, 30);
        assert_eq!(config.title.smoothing.delay_ms, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let toml = r#"
            [enhance.validation]
            max_retries = 5
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.enhance.validation.max_retries, 5);
        assert_eq!(config.enhance.validation.min_chars, ValidationSettings::default().min_chars);
        assert!(config.enhance.analyze_structure);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.enhance.validation.min_chars = 100;
        config.enhance.validation.max_chars = 10;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.enhance.marker.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.title.smoothing.chunking = "(unclosed".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smoothing_config_conversion() {
        let smoothing = SmoothingConfig {
            chunking: "line".to_string(),
            delay_ms: 15,
        };
        let config = smoothing.to_smooth_config().unwrap();
        assert!(matches!(config.chunking, Chunking::Line));
        assert_eq!(config.delay, Duration::from_millis(15));
    }
}
