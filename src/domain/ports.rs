use crate::domain::model::{CaptureSettings, Frame, UploadPolicy};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Source of camera frames. The session holds the only handle while it is alive.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn capture(&self) -> Result<Frame>;

    /// Gives the device back. Called once when the owning session is torn down.
    fn release(&self) {}
}

pub trait ConfigProvider: Send + Sync {
    fn server_address(&self) -> &str;
    fn capture_interval(&self) -> Duration;
    fn upload_policy(&self) -> UploadPolicy;
    fn request_timeout(&self) -> Option<Duration>;

    fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            interval: self.capture_interval(),
            policy: self.upload_policy(),
            ..CaptureSettings::default()
        }
    }
}
