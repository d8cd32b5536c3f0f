//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.aitask/aitask.toml
//! 3. Project-level config: ./.aitask/aitask.toml
//!
//! Later files override earlier ones key by key, so a project file only
//! needs the settings it changes. An explicit file (TOML, YAML or JSON)
//! replaces the layered lookup entirely.

use crate::config::schema::AppConfig;
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const CONFIG_DIR: &str = ".aitask";
const CONFIG_FILE: &str = "aitask.toml";

/// Configuration loader that handles both user and project configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for the standard locations
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: std::env::current_dir()
                .ok()
                .map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE)),
        }
    }

    /// Create a loader for custom locations
    pub fn with_paths(user: Option<PathBuf>, project: Option<PathBuf>) -> Self {
        Self {
            user_config_path: user,
            project_config_path: project,
        }
    }

    /// User-level config path
    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    /// Project-level config path
    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    /// Load configuration from both locations with project taking precedence
    pub async fn load(&self) -> Result<AppConfig> {
        let mut merged = toml::Table::new();

        for (scope, path) in [
            ("user", &self.user_config_path),
            ("project", &self.project_config_path),
        ] {
            let Some(path) = path else {
                continue;
            };
            let exists = fs::try_exists(path).await.map_err(|e| {
                AppError::config(format!("failed to check {}: {e}", path.display()))
            })?;
            if !exists {
                debug!(scope, path = %path.display(), "Config file not found, skipping");
                continue;
            }

            let content = fs::read_to_string(path).await.map_err(|e| {
                AppError::config(format!("failed to read {}: {e}", path.display()))
            })?;
            let layer: toml::Table = content.parse().map_err(|e| {
                AppError::config(format!("failed to parse {}: {e}", path.display()))
            })?;
            debug!(scope, path = %path.display(), "Loaded config layer");
            merge_tables(&mut merged, layer);
        }

        let config: AppConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| AppError::config(format!("invalid configuration: {e}")))?;
        finish(config)
    }

    /// Load a single file; the format is chosen by extension
    pub async fn load_file(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| AppError::config(format!("failed to read {}: {e}", path.display())))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                AppError::config(format!(
                    "unable to determine file extension for {}",
                    path.display()
                ))
            })?;

        let config: AppConfig = match extension.as_str() {
            "toml" => toml::from_str(&content).map_err(|e| AppError::config(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&content).map_err(|e| AppError::config(e.to_string()))?
            }
            "json" => serde_json::from_str(&content).map_err(|e| AppError::config(e.to_string()))?,
            other => {
                return Err(AppError::config(format!(
                    "unsupported config file extension: {other}"
                )))
            }
        };
        debug!(path = %path.display(), "Loaded config file");
        finish(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn finish(mut config: AppConfig) -> Result<AppConfig> {
    config.apply_env_overrides();
    config.validate()?;
    info!(log_level = %config.logging.level, "Configuration loaded");
    Ok(config)
}

/// Merge `overlay` into `base`, recursing into nested tables
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths() {
        let loader = ConfigLoader::new();
        if let Some(path) = loader.user_config_path() {
            assert!(path.ends_with(".aitask/aitask.toml"));
        }
        if let Some(path) = loader.project_config_path() {
            assert!(path.ends_with(".aitask/aitask.toml"));
        }
    }

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let loader = ConfigLoader::with_paths(
            Some(PathBuf::from("/nonexistent/user.toml")),
            Some(PathBuf::from("/nonexistent/project.toml")),
        );
        let config = loader.load().await.unwrap();

        assert_eq!(config.enhance.marker, "#");
        assert_eq!(config.enhance.validation.max_retries, 3);
    }

    #[tokio::test]
    async fn test_project_overrides_user_key_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let user_path = temp_dir.path().join("user.toml");
        let project_path = temp_dir.path().join("project.toml");

        fs::write(
            &user_path,
            r###"
[enhance]
marker = "##"
max_steps = 8

[enhance.validation]
min_chars = 4
max_chars = 40
"###,
        )
        .await
        .unwrap();
        fs::write(
            &project_path,
            r#"
[enhance.validation]
max_chars = 60

[title.smoothing]
chunking = "line"
"#,
        )
        .await
        .unwrap();

        let loader = ConfigLoader::with_paths(Some(user_path), Some(project_path));
        let config = loader.load().await.unwrap();

        assert_eq!(config.enhance.marker, "##"); // user
        assert_eq!(config.enhance.max_steps, 8); // user
        assert_eq!(config.enhance.validation.min_chars, 4); // user
        assert_eq!(config.enhance.validation.max_chars, 60); // project
        assert_eq!(config.title.smoothing.chunking, "line"); // project
        assert_eq!(config.title.smoothing.delay_ms, 10); // default
    }

    #[tokio::test]
    async fn test_invalid_layer_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let project_path = temp_dir.path().join("project.toml");
        fs::write(&project_path, "[enhance\nmarker = ").await.unwrap();

        let loader = ConfigLoader::with_paths(None, Some(project_path));
        assert!(matches!(loader.load().await, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_load_file_by_extension() {
        let temp_dir = TempDir::new().unwrap();

        let yaml_path = temp_dir.path().join("aitask.yaml");
        fs::write(&yaml_path, "enhance:\n  analyze_structure: false\n")
            .await
            .unwrap();
        let config = ConfigLoader::load_file(&yaml_path).await.unwrap();
        assert!(!config.enhance.analyze_structure);

        let json_path = temp_dir.path().join("aitask.json");
        fs::write(&json_path, r#"{"title": {"smoothing": {"delay_ms": 0}}}"#)
            .await
            .unwrap();
        let config = ConfigLoader::load_file(&json_path).await.unwrap();
        assert_eq!(config.title.smoothing.delay_ms, 0);

        let ini_path = temp_dir.path().join("aitask.ini");
        fs::write(&ini_path, "x=1").await.unwrap();
        assert!(ConfigLoader::load_file(&ini_path).await.is_err());
    }

    #[tokio::test]
    async fn test_loaded_config_is_validated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("aitask.toml");
        fs::write(&path, "[enhance]\nmax_steps = 0\n").await.unwrap();

        assert!(matches!(
            ConfigLoader::load_file(&path).await,
            Err(AppError::Config(_))
        ));
    }
}
