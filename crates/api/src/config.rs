//! Application configuration
//!
//! Defaults are the fixed constants the monitor runs with. Any field can be
//! overridden from the environment with the `DROWSY_` prefix and `__` as the
//! nesting separator, e.g. `DROWSY_SERVER__ADDR=127.0.0.1:5000` or
//! `DROWSY_DMS__THRESHOLD_FRAMES=15`. There is no configuration file.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use camera_capture::CameraConfig;
use config::Environment;
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "DROWSY";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
    /// Front-end origins allowed to query the status endpoint
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5000".to_string(),
            allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Allowed origins as header values; returns the first origin that is not
    /// a valid header value
    pub fn origin_headers(&self) -> Result<Vec<HeaderValue>, String> {
        self.allowed_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>().map_err(|_| origin.clone()))
            .collect()
    }
}

/// Acquisition loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between frames to bound CPU usage (milliseconds)
    pub loop_delay_ms: u64,
    /// JPEG quality of streamed frames (1-100)
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loop_delay_ms: 30,
            jpeg_quality: 80,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub dms: DmsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load defaults overridden by `DROWSY_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::environment())
    }

    /// Load from an explicit environment source
    pub fn load_from(env: Environment) -> Result<Self, ConfigError> {
        let config: AppConfig = config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("server.allowed_origins")
    }

    /// Check values that would otherwise fail later at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        let addr = &self.server.addr;
        addr.parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid(format!("server.addr {:?}: {}", addr, e)))?;

        self.server.origin_headers().map_err(|origin| {
            ConfigError::Invalid(format!("server.allowed_origins {:?}", origin))
        })?;

        self.dms
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera resolution {}x{} must be non-zero",
                self.camera.width, self.camera.height
            )));
        }

        if !(1..=100).contains(&self.pipeline.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.jpeg_quality {} must be within 1-100",
                self.pipeline.jpeg_quality
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;
    use dms::DebouncePolicy;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::environment().source(Some(source))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_from(env(&[])).unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:5000");
        assert_eq!(config.server.allowed_origins.len(), 2);
        assert_eq!(config.dms.threshold_frames, 10);
        assert_eq!(config.dms.policy, DebouncePolicy::HardReset);
        assert_eq!((config.camera.width, config.camera.height), (640, 480));
        assert_eq!(config.pipeline.loop_delay_ms, 30);
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::load_from(env(&[
            ("DROWSY_SERVER__ADDR", "127.0.0.1:6000"),
            ("DROWSY_SERVER__ALLOWED_ORIGINS", "http://a.test,http://b.test"),
            ("DROWSY_DMS__THRESHOLD_FRAMES", "15"),
            ("DROWSY_DMS__POLICY", "decay"),
            ("DROWSY_CAMERA__KIND", "synthetic"),
            ("DROWSY_LOGGING__JSON", "true"),
        ]))
        .unwrap();

        assert_eq!(config.server.addr, "127.0.0.1:6000");
        assert_eq!(
            config.server.allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.dms.threshold_frames, 15);
        assert_eq!(config.dms.policy, DebouncePolicy::Decay);
        assert_eq!(config.camera.kind, camera_capture::SourceKind::Synthetic);
        assert!(config.logging.json);
        // Untouched siblings keep their defaults
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result = AppConfig::load_from(env(&[("DROWSY_DMS__THRESHOLD_FRAMES", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_address_rejected() {
        let result = AppConfig::load_from(env(&[("DROWSY_SERVER__ADDR", "not-an-address")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unparsable_origin_rejected() {
        let mut config = AppConfig::default();
        config.server.allowed_origins.push("bad\norigin".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_jpeg_quality_bounds() {
        let mut config = AppConfig::default();
        config.pipeline.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.pipeline.jpeg_quality = 100;
        assert!(config.validate().is_ok());
    }
}
