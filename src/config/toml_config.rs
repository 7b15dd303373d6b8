use crate::core::{ConfigProvider, SessionParams, UploadPolicy};
use crate::utils::error::{GuideError, Result};
use crate::utils::logger::LogFormat;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_server_address,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub number_of_route_markers: String,
    pub number_of_cars: String,
    pub marker_size_cm: String,
    pub calibration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub frames: String,
    pub interval_ms: Option<u64>,
    pub max_in_flight: Option<usize>,
    pub duration_seconds: Option<u64>,
    pub calibration_snapshot: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub format: Option<String>,
}

impl TomlConfig {
    pub const DEFAULT_DURATION_SECONDS: u64 = 30;

    /// Loads a session description from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GuideError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the value of environment variable `VAR`; unknown
    /// variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| GuideError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn session_params(&self) -> SessionParams {
        SessionParams::new(
            self.session.number_of_route_markers.clone(),
            self.session.number_of_cars.clone(),
            self.session.marker_size_cm.clone(),
        )
    }

    pub fn calibration_path(&self) -> &str {
        &self.session.calibration
    }

    pub fn frames_path(&self) -> &str {
        &self.capture.frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(
            self.capture
                .duration_seconds
                .unwrap_or(Self::DEFAULT_DURATION_SECONDS),
        )
    }

    pub fn calibration_snapshot(&self) -> bool {
        self.capture.calibration_snapshot.unwrap_or(false)
    }

    pub fn verbose(&self) -> bool {
        self.logging
            .as_ref()
            .and_then(|l| l.verbose)
            .unwrap_or(false)
    }

    /// Unknown names fall back to compact; `validate` rejects them first.
    pub fn log_format(&self) -> LogFormat {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .and_then(LogFormat::parse)
            .unwrap_or_default()
    }
}

impl ConfigProvider for TomlConfig {
    fn server_address(&self) -> &str {
        &self.server.address
    }

    fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture.interval_ms.unwrap_or(10))
    }

    fn upload_policy(&self) -> UploadPolicy {
        self.capture
            .max_in_flight
            .map(UploadPolicy::from_max_in_flight)
            .unwrap_or_default()
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.server.timeout_seconds.map(Duration::from_secs)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_server_address("server.address", &self.server.address)?;
        self.session_params().validate()?;
        validate_path("session.calibration", &self.session.calibration)?;
        validate_path("capture.frames", &self.capture.frames)?;

        if let Some(interval) = self.capture.interval_ms {
            validate_positive_number("capture.interval_ms", interval, 1)?;
        }
        if let Some(duration) = self.capture.duration_seconds {
            validate_positive_number("capture.duration_seconds", duration, 1)?;
        }
        if let Some(format) = self.logging.as_ref().and_then(|l| l.format.as_deref()) {
            validate_non_empty_string("logging.format", format)?;
            if LogFormat::parse(format).is_none() {
                return Err(GuideError::InvalidInputError {
                    field: "logging.format".to_string(),
                    value: format.to_string(),
                    reason: format!("Supported formats: {}", LogFormat::NAMES.join(", ")),
                });
            }
        }

        Ok(())
    }
}
