use crate::core::api::ApiClient;
use crate::core::capture_loop::CaptureLoop;
use crate::core::{
    Calibration, CameraProvider, CaptureSettings, CaptureStats, ConfigProvider, Frame,
    SessionParams, SessionState, Standings,
};
use crate::utils::error::{GuideError, Result};
use crate::utils::validation::{validate_positive_decimal, Validate};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// File name used for the one-shot calibration upload.
pub const CALIBRATION_FILE_NAME: &str = "calibration.jpg";

impl Validate for SessionParams {
    fn validate(&self) -> Result<()> {
        validate_positive_decimal("number_of_route_markers", &self.number_of_route_markers)?;
        validate_positive_decimal("number_of_cars", &self.number_of_cars)?;
        validate_positive_decimal("marker_size_cm", &self.marker_size_cm)?;
        Ok(())
    }
}

/// Session-owned handle on a camera. The device is released when the last
/// clone drops, so a tick task still inside `capture` keeps it open.
struct CameraLease {
    camera: Arc<dyn CameraProvider>,
}

#[async_trait]
impl CameraProvider for CameraLease {
    fn is_ready(&self) -> bool {
        self.camera.is_ready()
    }

    async fn capture(&self) -> Result<Frame> {
        self.camera.capture().await
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.camera.release();
        tracing::debug!("Camera released");
    }
}

/// One tracking run: initialize on the server, stream frames, fetch standings.
///
/// The session owns the camera handed to [`Session::start_capture`] and releases
/// it when the session ends or is dropped, after the last capture using it.
pub struct Session {
    api: ApiClient,
    settings: CaptureSettings,
    state: SessionState,
    camera: Option<Arc<CameraLease>>,
    capture: Option<CaptureLoop>,
    last_stats: Option<CaptureStats>,
}

impl Session {
    pub fn new(api: ApiClient, settings: CaptureSettings) -> Self {
        Self {
            api,
            settings,
            state: SessionState::Uninitialized,
            camera: None,
            capture: None,
            last_stats: None,
        }
    }

    /// Session that was initialized on the server by another client run.
    pub fn attach(api: ApiClient, settings: CaptureSettings) -> Self {
        let mut session = Self::new(api, settings);
        session.state = SessionState::Active;
        session
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        Ok(Self::new(
            ApiClient::from_config(config)?,
            config.capture_settings(),
        ))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureLoop::is_running)
    }

    /// Counters of the current capture loop, or of the last one after teardown.
    pub fn capture_stats(&self) -> Option<CaptureStats> {
        self.capture
            .as_ref()
            .map(CaptureLoop::stats)
            .or(self.last_stats)
    }

    fn expect_state(&self, expected: SessionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GuideError::SessionStateError {
                expected: expected.to_string(),
                actual: self.state.to_string(),
            })
        }
    }

    /// Validates the operator's input and creates the session on the server.
    /// A failed attempt leaves the session uninitialized so it can be retried.
    pub async fn initialize(
        &mut self,
        params: &SessionParams,
        calibration: &Calibration,
    ) -> Result<()> {
        self.expect_state(SessionState::Uninitialized)?;
        params.validate()?;

        self.api.initialize(params, calibration).await?;
        self.state = SessionState::Active;
        Ok(())
    }

    /// Starts streaming frames from `camera`. Returns `Ok(false)` when the loop
    /// is already running.
    pub fn start_capture(&mut self, camera: Arc<dyn CameraProvider>) -> Result<bool> {
        self.expect_state(SessionState::Active)?;

        if self.is_capturing() {
            return Ok(false);
        }

        if !camera.is_ready() {
            return Err(GuideError::CameraUnavailable {
                message: "camera is not ready".to_string(),
            });
        }

        let held = self
            .camera
            .as_ref()
            .filter(|lease| Arc::ptr_eq(&lease.camera, &camera))
            .cloned();
        let lease = match held {
            Some(lease) => lease,
            None => {
                self.release_camera();
                let lease = Arc::new(CameraLease { camera });
                self.camera = Some(Arc::clone(&lease));
                lease
            }
        };

        self.retire_capture();
        let mut capture = CaptureLoop::new(lease, self.api.clone(), self.settings.clone());
        let started = capture.start();
        self.capture = Some(capture);
        Ok(started)
    }

    pub fn stop_capture(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.stop();
        }
    }

    /// Waits for uploads started before the last stop.
    pub async fn drain_uploads(&self, timeout: Duration) -> bool {
        match &self.capture {
            Some(capture) => capture.wait_for_in_flight(timeout).await,
            None => true,
        }
    }

    /// Streams from `camera` for `duration`, then stops and gives in-flight
    /// uploads up to `drain` to complete.
    pub async fn capture_for(
        &mut self,
        camera: Arc<dyn CameraProvider>,
        duration: Duration,
        drain: Duration,
    ) -> Result<CaptureStats> {
        if !self.start_capture(camera)? {
            tracing::warn!("Capture loop was already running");
        }

        tokio::time::sleep(duration).await;
        self.shutdown_capture(drain).await;
        Ok(self.capture_stats().unwrap_or_default())
    }

    async fn shutdown_capture(&mut self, drain: Duration) {
        if let Some(capture) = self.capture.as_mut() {
            if !capture.shutdown(drain).await {
                tracing::warn!(
                    "Uploads still in flight after {:?}, camera stays open until they finish",
                    drain
                );
            }
        }
    }

    /// Captures a single frame and uploads it for server-side calibration.
    /// Works in any session state.
    pub async fn capture_calibration_frame(&self, camera: &dyn CameraProvider) -> Result<()> {
        if !camera.is_ready() {
            return Err(GuideError::CameraUnavailable {
                message: "camera is not ready".to_string(),
            });
        }

        let frame = camera.capture().await?;
        self.api
            .upload_image(&frame, CALIBRATION_FILE_NAME, None)
            .await?;
        tracing::info!("Calibration frame uploaded ({} bytes)", frame.data.len());
        Ok(())
    }

    /// Stops capturing, lets tick tasks finish, then fetches times and ranks
    /// them. On a fetch failure the session stays active so the operator can
    /// try again.
    pub async fn finish(&mut self) -> Result<Standings> {
        self.expect_state(SessionState::Active)?;
        self.shutdown_capture(self.settings.drain_timeout).await;

        let sheet = self.api.get_times().await?;
        let standings = sheet.standings();

        self.end();
        Ok(standings)
    }

    /// Tears the session down without fetching results. Tick tasks still
    /// capturing keep the camera until they are done.
    pub fn end(&mut self) {
        self.release_camera();
        if self.state != SessionState::Ended {
            tracing::debug!("Session {} -> ended", self.state);
            self.state = SessionState::Ended;
        }
    }

    fn retire_capture(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
            self.last_stats = Some(capture.stats());
        }
    }

    fn release_camera(&mut self) {
        self.retire_capture();
        self.camera = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release_camera();
    }
}
