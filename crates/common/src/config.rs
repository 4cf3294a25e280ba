//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default directory for extracted image sets. When unset, output goes
    /// next to each source video.
    pub output_dir: Option<PathBuf>,

    /// Default extraction parameters applied to new jobs.
    pub extraction: ExtractionDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionDefaults {
    /// Output resolution (square) for reprojected views.
    pub resolution: u32,

    /// Horizontal field of view per virtual camera, degrees.
    pub fov_deg: f64,

    /// Number of virtual cameras.
    pub camera_count: u32,

    /// JPEG quality for jpg output.
    pub jpeg_quality: u8,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "panoframe=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            extraction: ExtractionDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            resolution: 2048,
            fov_deg: 90.0,
            camera_count: 6,
            jpeg_quality: 95,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("panoframe").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.extraction.resolution, 2048);
        assert_eq!(parsed.extraction.camera_count, 6);
        assert_eq!(parsed.logging.level, "info");
    }
}
