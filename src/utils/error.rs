use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuideError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidInputError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required value: {field}")]
    MissingInputError { field: String },

    #[error("Calibration asset '{path}' could not be loaded: {message}")]
    CalibrationError { path: String, message: String },

    #[error("Server returned HTTP {status} for {endpoint}")]
    StatusError { endpoint: String, status: u16 },

    #[error("Unexpected server response: {message}")]
    ResponseFormatError { message: String },

    #[error("Camera unavailable: {message}")]
    CameraUnavailable { message: String },

    #[error("Frame capture failed: {message}")]
    CaptureError { message: String },

    #[error("Session is {actual}, expected {expected}")]
    SessionStateError { expected: String, actual: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Calibration,
    Network,
    Camera,
    Response,
    Session,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GuideError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GuideError::InvalidInputError { .. } | GuideError::MissingInputError { .. } => {
                ErrorCategory::Input
            }
            GuideError::CalibrationError { .. } => ErrorCategory::Calibration,
            GuideError::HttpError(_) | GuideError::StatusError { .. } => ErrorCategory::Network,
            GuideError::CameraUnavailable { .. } | GuideError::CaptureError { .. } => {
                ErrorCategory::Camera
            }
            GuideError::ResponseFormatError { .. } | GuideError::SerializationError(_) => {
                ErrorCategory::Response
            }
            GuideError::SessionStateError { .. } => ErrorCategory::Session,
            GuideError::ConfigError { .. } => ErrorCategory::Configuration,
            GuideError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // Operator can fix these and resubmit.
            ErrorCategory::Input | ErrorCategory::Session => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Response => ErrorSeverity::Medium,
            ErrorCategory::Calibration | ErrorCategory::Configuration | ErrorCategory::Camera => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Short message suitable for inline status text.
    pub fn user_friendly_message(&self) -> String {
        match self {
            GuideError::InvalidInputError { field, reason, .. } => {
                format!("Please check '{}': {}", field, reason)
            }
            GuideError::MissingInputError { field } => format!("Please fill in '{}'", field),
            GuideError::CalibrationError { .. } => {
                "Failed to load camera calibration data".to_string()
            }
            GuideError::HttpError(e) if e.is_timeout() => {
                "The server did not respond in time".to_string()
            }
            GuideError::HttpError(_) => "Could not reach the server".to_string(),
            GuideError::StatusError { status, .. } => {
                format!("The server rejected the request (HTTP {})", status)
            }
            GuideError::ResponseFormatError { .. } | GuideError::SerializationError(_) => {
                "The server sent a response that could not be read".to_string()
            }
            GuideError::CameraUnavailable { message } => {
                format!("Camera is not available: {}", message)
            }
            GuideError::CaptureError { .. } => "Failed to take a picture".to_string(),
            GuideError::SessionStateError { .. } => {
                "That action is not possible right now".to_string()
            }
            GuideError::ConfigError { message } => format!("Invalid configuration: {}", message),
            GuideError::IoError(e) => format!("File system error: {}", e),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Correct the highlighted value and submit again",
            ErrorCategory::Calibration => "Check that the calibration file exists and contains camera_matrix and dist_coeffs",
            ErrorCategory::Network => "Check the server address and that the server is running on port 5000, then retry",
            ErrorCategory::Camera => "Check that the camera source is connected and has frames available",
            ErrorCategory::Response => "Retry; if the problem persists the server version may not match this client",
            ErrorCategory::Session => "Start a new session or finish the current one first",
            ErrorCategory::Configuration => "Fix the configuration file or command line arguments",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, GuideError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_low_severity() {
        let err = GuideError::MissingInputError {
            field: "number_of_cars".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.user_friendly_message(), "Please fill in 'number_of_cars'");
    }

    #[test]
    fn test_status_error_is_network() {
        let err = GuideError::StatusError {
            endpoint: "/api/initialize".to_string(),
            status: 500,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("500"));
        assert!(err.recovery_suggestion().contains("port 5000"));
    }

    #[test]
    fn test_io_error_is_critical() {
        let err: GuideError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
