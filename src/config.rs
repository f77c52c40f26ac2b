use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub vision_library: PathBuf,
    pub storage_dir: PathBuf,
    pub frames_dir: Option<PathBuf>,
    pub telemetry_period_ms: u64,
    pub frame_period_ms: u64,
    pub log_level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            vision_library: PathBuf::from("libvision.so"),
            storage_dir: PathBuf::from("."),
            frames_dir: None,
            telemetry_period_ms: 100,
            frame_period_ms: 33,
            log_level: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Reads `skystone.toml` (if present) and then `SKYSTONE_*` environment
    /// overrides on top of the defaults.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from("skystone")
    }

    pub fn load_from(file_stem: &str) -> Result<Self, AppError> {
        let settings = Config::builder()
            .add_source(File::with_name(file_stem).required(false))
            .add_source(Environment::with_prefix("SKYSTONE").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms.max(1))
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms)
    }

    // Unknown level names fall back to INFO.
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}
