use crate::utils::error::{GuideError, Result};
use url::Url;

/// Port the guidance server listens on when the operator enters a bare host.
pub const DEFAULT_SERVER_PORT: u16 = 5000;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Turns an operator-entered server address into a base URL without a trailing slash.
///
/// Accepts a bare host or IP (`192.168.1.20`, port 5000 is assumed), `host:port`,
/// or a full `http://` / `https://` URL which is used as given.
pub fn parse_server_address(field_name: &str, address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: address.to_string(),
            reason: "Server address cannot be empty".to_string(),
        });
    }

    let explicit_scheme = address.contains("://");
    let candidate = if explicit_scheme {
        address.to_string()
    } else {
        format!("http://{}", address)
    };

    let mut url = Url::parse(&candidate).map_err(|e| GuideError::InvalidInputError {
        field: field_name.to_string(),
        value: address.to_string(),
        reason: format!("Invalid server address: {}", e),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(GuideError::InvalidInputError {
                field: field_name.to_string(),
                value: address.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            })
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: address.to_string(),
            reason: "Server address has no host".to_string(),
        });
    }

    if !explicit_scheme && !has_explicit_port(address) {
        // set_port only fails for hosts that cannot carry a port, which http URLs always can
        let _ = url.set_port(Some(DEFAULT_SERVER_PORT));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn has_explicit_port(bare_address: &str) -> bool {
    let authority = bare_address.split('/').next().unwrap_or_default();
    match authority.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

pub fn validate_server_address(field_name: &str, address: &str) -> Result<()> {
    parse_server_address(field_name, address).map(|_| ())
}

/// Operator-entered numbers stay strings on the wire; this only checks they parse.
pub fn validate_positive_decimal(field_name: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GuideError::MissingInputError {
            field: field_name.to_string(),
        });
    }

    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() && number > 0.0 => Ok(()),
        Ok(_) => Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a positive number".to_string(),
        }),
        Err(_) => Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value must be a number".to_string(),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GuideError::InvalidInputError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_address() {
        assert_eq!(
            parse_server_address("server", "192.168.1.20").unwrap(),
            "http://192.168.1.20:5000"
        );
        assert_eq!(
            parse_server_address("server", " 10.0.0.2:8080 ").unwrap(),
            "http://10.0.0.2:8080"
        );
        assert_eq!(
            parse_server_address("server", "http://127.0.0.1:41234").unwrap(),
            "http://127.0.0.1:41234"
        );
        assert_eq!(
            parse_server_address("server", "https://guide.example.com/").unwrap(),
            "https://guide.example.com"
        );
        assert_eq!(
            parse_server_address("server", "localhost").unwrap(),
            "http://localhost:5000"
        );
    }

    #[test]
    fn test_parse_server_address_rejects_bad_input() {
        assert!(parse_server_address("server", "").is_err());
        assert!(parse_server_address("server", "   ").is_err());
        assert!(parse_server_address("server", "ftp://example.com").is_err());
        assert!(parse_server_address("server", "http://").is_err());
    }

    #[test]
    fn test_validate_positive_decimal() {
        assert!(validate_positive_decimal("marker_size_cm", "12.5").is_ok());
        assert!(validate_positive_decimal("number_of_cars", " 3 ").is_ok());
        assert!(matches!(
            validate_positive_decimal("number_of_cars", ""),
            Err(GuideError::MissingInputError { .. })
        ));
        assert!(validate_positive_decimal("number_of_cars", "three").is_err());
        assert!(validate_positive_decimal("number_of_cars", "0").is_err());
        assert!(validate_positive_decimal("number_of_cars", "-2").is_err());
        assert!(validate_positive_decimal("number_of_cars", "NaN").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("interval_ms", 10, 1).is_ok());
        assert!(validate_positive_number("interval_ms", 0, 1).is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("calibration", "assets/calibration.json").is_ok());
        assert!(validate_path("calibration", "").is_err());
        assert!(validate_path("calibration", "bad\0path").is_err());
    }
}
