//! Configuration for wwt-core
//!
//! Centralized configuration for transport behaviour, initial view state,
//! imagery catalogs, HTML export and logging.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{WwtError, WwtResult};

/// Client-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WwtConfig {
    /// Engine transport settings
    pub transport: TransportConfig,
    /// Initial view state
    pub view: ViewConfig,
    /// Imagery catalog sources
    pub imagery: ImageryConfig,
    /// HTML bundle export
    pub export: ExportConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long a read-back waits for the engine, in milliseconds (0 = forever)
    pub request_timeout_ms: u64,
    /// Hold messages until the engine signals readiness
    pub queue_until_ready: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5000,
            queue_until_ready: true,
        }
    }
}

impl TransportConfig {
    /// Read-back timeout; `None` waits forever
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Initial view configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Foreground imagery name
    pub default_foreground: String,
    /// Background imagery name
    pub default_background: String,
    /// Foreground opacity, 0 to 1
    pub default_foreground_opacity: f64,
    /// Field of view after a reset, degrees
    pub default_fov_deg: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_foreground: "Digitized Sky Survey (Color)".to_string(),
            default_background: "Hydrogen Alpha Full Sky Map".to_string(),
            default_foreground_opacity: 0.8,
            default_fov_deg: 60.0,
        }
    }
}

/// Imagery catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    /// WTML document listing the standard surveys
    pub surveys_url: String,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            surveys_url: "https://worldwidetelescope.org/wwtweb/catalog.aspx?W=surveys".to_string(),
        }
    }
}

/// HTML bundle export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Script loaded by the exported page to run the engine
    pub engine_script_url: String,
    /// Directory, relative to the bundle, holding layer data files
    pub data_dir_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            engine_script_url: "https://web.wwtassets.org/engine/7/wwtsdk.js".to_string(),
            data_dir_name: "layer_data".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, e.g. "info" or "wwt_core=debug"
    pub filter: String,
    /// Colored output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

impl WwtConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> WwtResult<Self> {
        toml::from_str(toml_str).map_err(|e| WwtError::Config(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> WwtResult<String> {
        toml::to_string_pretty(self).map_err(|e| WwtError::Config(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> WwtResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> WwtResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> WwtResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config_dir>/wwt/config.toml`, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wwt").join("config.toml"))
    }

    /// Load the user configuration, falling back to defaults when absent
    pub fn load_default() -> WwtResult<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                tracing::debug!("no user configuration found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> WwtResult<()> {
        let opacity = self.view.default_foreground_opacity;
        if !(0.0..=1.0).contains(&opacity) {
            return Err(WwtError::Config(format!(
                "default_foreground_opacity must be between 0.0 and 1.0, got {}",
                opacity
            )));
        }

        if !(self.view.default_fov_deg > 0.0 && self.view.default_fov_deg <= 360.0) {
            return Err(WwtError::Config(
                "default_fov_deg must be in (0, 360]".to_string(),
            ));
        }

        let view = &self.view;
        if view.default_foreground.trim().is_empty() || view.default_background.trim().is_empty() {
            return Err(WwtError::Config(
                "default imagery names must not be empty".to_string(),
            ));
        }

        let data_dir = &self.export.data_dir_name;
        if data_dir.is_empty() || data_dir.contains(['/', '\\']) || data_dir == ".." {
            return Err(WwtError::Config(format!(
                "data_dir_name must be a plain directory name, got '{}'",
                data_dir
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WwtConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transport.request_timeout(), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn test_zero_timeout_waits_forever() {
        let mut config = WwtConfig::default();
        config.transport.request_timeout_ms = 0;
        assert_eq!(config.transport.request_timeout(), None);
    }

    #[test]
    fn test_toml_partial_sections() {
        let config = WwtConfig::from_toml(
            r#"
            [transport]
            request_timeout_ms = 250

            [logging]
            filter = "wwt_core=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.transport.request_timeout_ms, 250);
        assert!(config.transport.queue_until_ready);
        assert_eq!(config.logging.filter, "wwt_core=debug");
        assert_eq!(config.export.data_dir_name, "layer_data");
    }

    #[test]
    fn test_json_serialization() {
        let config = WwtConfig::default();
        let parsed = WwtConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
        let parsed = WwtConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_out_of_range() {
        let mut config = WwtConfig::default();
        config.view.default_foreground_opacity = 1.5;
        assert!(config.validate().is_err());

        let mut config = WwtConfig::default();
        config.export.data_dir_name = "../escape".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[view]\ndefault_fov_deg = 30.0\n").unwrap();
        let config = WwtConfig::load(&path).unwrap();
        assert_eq!(config.view.default_fov_deg, 30.0);

        std::fs::write(&path, "[view]\ndefault_fov_deg = -1.0\n").unwrap();
        assert!(matches!(WwtConfig::load(&path), Err(WwtError::Config(_))));
    }
}
