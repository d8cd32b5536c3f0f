//! Configuration management
//!
//! Supports dual-location configuration:
//! - User-level: ~/.aitask/aitask.toml
//! - Project-level: ./.aitask/aitask.toml
//!
//! Project-level config overrides user-level config. `AITASK_LOG` overrides
//! the configured log level.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AppConfig, EnhanceConfig, LoggingConfig, SmoothingConfig, TitleConfig, ValidationSettings,
    LOG_LEVEL_ENV,
};

use crate::error::Result;
use std::path::Path;

/// Load configuration from `path`, or from the standard locations when `None`
pub async fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => ConfigLoader::load_file(path).await,
        None => ConfigLoader::new().load().await,
    }
}
