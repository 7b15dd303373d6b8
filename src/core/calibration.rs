use crate::core::Calibration;
use crate::utils::error::{GuideError, Result};
use serde_json::Value;
use std::path::Path;

impl Calibration {
    /// Loads the camera calibration JSON shipped alongside the client.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| GuideError::CalibrationError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, source: &str) -> Result<Self> {
        let fail = |message: String| GuideError::CalibrationError {
            path: source.to_string(),
            message,
        };

        let value: Value =
            serde_json::from_str(content).map_err(|e| fail(format!("invalid JSON: {}", e)))?;
        let Value::Object(mut fields) = value else {
            return Err(fail("expected a JSON object".to_string()));
        };

        let mut take_array = |name: &str| -> Result<Value> {
            match fields.remove(name) {
                Some(Value::Array(items)) if !items.is_empty() => Ok(Value::Array(items)),
                Some(Value::Array(_)) => Err(fail(format!("'{}' is empty", name))),
                Some(_) => Err(fail(format!("'{}' must be an array", name))),
                None => Err(fail(format!("missing '{}'", name))),
            }
        };

        let camera_matrix = take_array("camera_matrix")?;
        let dist_coeffs = take_array("dist_coeffs")?;

        Ok(Self {
            camera_matrix,
            dist_coeffs,
        })
    }

    /// The two form fields sent with `initialize`, JSON-encoded.
    pub fn form_fields(&self) -> Result<(String, String)> {
        Ok((
            serde_json::to_string(&self.camera_matrix)?,
            serde_json::to_string(&self.dist_coeffs)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "camera_matrix": [[1000.0, 0.0, 640.0], [0.0, 1000.0, 360.0], [0.0, 0.0, 1.0]],
        "dist_coeffs": [[0.1, -0.05, 0.0, 0.0, 0.01]],
        "rms": 0.42
    }"#;

    #[test]
    fn test_load_calibration_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let calibration = Calibration::from_file(file.path()).unwrap();
        let (matrix, coeffs) = calibration.form_fields().unwrap();

        assert_eq!(
            matrix,
            "[[1000.0,0.0,640.0],[0.0,1000.0,360.0],[0.0,0.0,1.0]]"
        );
        assert_eq!(coeffs, "[[0.1,-0.05,0.0,0.0,0.01]]");
    }

    #[test]
    fn test_missing_file_is_calibration_error() {
        let err = Calibration::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, GuideError::CalibrationError { .. }));
    }

    #[test]
    fn test_rejects_malformed_calibration() {
        let cases = [
            "not json",
            "[]",
            r#"{"camera_matrix": [[1.0]]}"#,
            r#"{"camera_matrix": [], "dist_coeffs": [0.1]}"#,
            r#"{"camera_matrix": "eye(3)", "dist_coeffs": [0.1]}"#,
        ];
        for case in cases {
            let err = Calibration::from_json_str(case).unwrap_err();
            assert!(
                matches!(err, GuideError::CalibrationError { .. }),
                "unexpected error for {}: {:?}",
                case,
                err
            );
        }
    }
}
