use crate::core::ordering::TimingSheet;
use crate::core::{Calibration, ConfigProvider, Frame, SessionParams};
use crate::utils::error::{GuideError, Result};
use crate::utils::validation::parse_server_address;
use reqwest::multipart::{Form, Part};
use chrono::SecondsFormat;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub const INITIALIZE_PATH: &str = "/api/initialize";
pub const IMAGE_PATH: &str = "/api/image";
pub const TIMES_PATH: &str = "/api/get_times";

/// Header carrying the tick number of an uploaded frame.
pub const FRAME_SEQUENCE_HEADER: &str = "X-Frame-Sequence";
/// Header carrying the capture instant of an uploaded frame, RFC 3339 UTC.
pub const FRAME_CAPTURED_AT_HEADER: &str = "X-Frame-Captured-At";

/// HTTP client for one guidance server. Cloning is cheap and shares the
/// connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(server_address: &str) -> Result<Self> {
        Self::with_timeout(server_address, None)
    }

    pub fn with_timeout(server_address: &str, timeout: Option<Duration>) -> Result<Self> {
        let base_url = parse_server_address("server_address", server_address)?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        Self::with_timeout(config.server_address(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Creates the tracking session on the server.
    pub async fn initialize(&self, params: &SessionParams, calibration: &Calibration) -> Result<()> {
        let (camera_matrix, dist_coeffs) = calibration.form_fields()?;
        let url = self.endpoint(INITIALIZE_PATH);

        tracing::debug!("Initializing session at {}", url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("number_of_route_markers", params.number_of_route_markers.trim()),
                ("number_of_cars", params.number_of_cars.trim()),
                ("marker_size_cm", params.marker_size_cm.trim()),
                ("camera_matrix", camera_matrix.as_str()),
                ("dist_coeffs", dist_coeffs.as_str()),
            ])
            .send()
            .await?;

        check_status(INITIALIZE_PATH, &response)?;
        tracing::info!("Session initialized on {}", self.base_url);
        Ok(())
    }

    /// Sends one frame as multipart field `image`.
    pub async fn upload_image(
        &self,
        frame: &Frame,
        file_name: &str,
        sequence: Option<u64>,
    ) -> Result<()> {
        let part = Part::bytes(frame.data.clone())
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new().part("image", part);

        let captured_at = frame
            .captured_at
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut request = self
            .client
            .post(self.endpoint(IMAGE_PATH))
            .header(FRAME_CAPTURED_AT_HEADER, captured_at)
            .multipart(form);
        if let Some(sequence) = sequence {
            request = request.header(FRAME_SEQUENCE_HEADER, sequence.to_string());
        }

        let response = request.send().await?;
        check_status(IMAGE_PATH, &response)?;
        tracing::trace!(
            "Uploaded {} ({} bytes, {} ms after capture)",
            file_name,
            frame.data.len(),
            frame.age().num_milliseconds()
        );
        Ok(())
    }

    pub async fn get_times(&self) -> Result<TimingSheet> {
        let url = self.endpoint(TIMES_PATH);
        tracing::debug!("Fetching times from {}", url);

        let response = self.client.get(&url).send().await?;
        check_status(TIMES_PATH, &response)?;

        let body = response.text().await?;
        let sheet = TimingSheet::from_json_str(&body)?;
        tracing::debug!("Received {} timing entries", sheet.len());
        Ok(sheet)
    }
}

/// The server answers 200 on success; any other status, 2xx included, is an error.
fn check_status(endpoint: &str, response: &Response) -> Result<()> {
    let status = response.status();
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(GuideError::StatusError {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
