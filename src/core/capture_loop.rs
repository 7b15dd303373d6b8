//! Fixed-interval capture and upload of camera frames.
//!
//! Every tick captures one frame and posts it to `/api/image` from its own task,
//! so a slow upload never delays the next tick. How many of those tasks may run
//! at once is set by [`UploadPolicy`](crate::domain::model::UploadPolicy); a
//! tick that finds no free slot is dropped, never queued. Failures are counted
//! and logged, they do not stop the loop.

use crate::core::api::ApiClient;
use crate::core::{CameraProvider, CaptureSettings, CaptureStats};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    ticks_skipped: AtomicU64,
    frames_captured: AtomicU64,
    capture_failures: AtomicU64,
    uploads_succeeded: AtomicU64,
    uploads_failed: AtomicU64,
    in_flight: AtomicU64,
    idle: Notify,
}

impl Counters {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            uploads_succeeded: self.uploads_succeeded.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            uploads_in_flight: self.in_flight.load(Ordering::Acquire),
        }
    }
}

/// Decrements the in-flight count however the tick task ends.
struct InFlightGuard {
    counters: Arc<Counters>,
}

impl InFlightGuard {
    fn enter(counters: &Arc<Counters>) -> Self {
        counters.in_flight.fetch_add(1, Ordering::AcqRel);
        Self {
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.counters.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counters.idle.notify_waiters();
        }
    }
}

pub struct CaptureLoop {
    camera: Arc<dyn CameraProvider>,
    api: ApiClient,
    settings: CaptureSettings,
    counters: Arc<Counters>,
    ticker: Option<JoinHandle<()>>,
}

impl CaptureLoop {
    pub fn new(camera: Arc<dyn CameraProvider>, api: ApiClient, settings: CaptureSettings) -> Self {
        Self {
            camera,
            api,
            settings,
            counters: Arc::new(Counters::default()),
            ticker: None,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Starts ticking on the current tokio runtime. Returns `false` without
    /// creating a timer when already running or when the camera is not ready.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            tracing::debug!("Capture loop already running");
            return false;
        }

        if !self.camera.is_ready() {
            tracing::warn!("Camera not ready, capture loop not started");
            return false;
        }

        let limiter = self
            .settings
            .policy
            .limit()
            .map(|permits| Arc::new(Semaphore::new(permits)));

        tracing::info!(
            "Starting capture loop: interval {:?}, {}",
            self.settings.interval,
            self.settings.policy.describe()
        );

        self.ticker = Some(tokio::spawn(run_ticker(
            Arc::clone(&self.camera),
            self.api.clone(),
            self.settings.clone(),
            Arc::clone(&self.counters),
            limiter,
        )));
        true
    }

    /// Cancels future ticks. Uploads already in flight finish on their own.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            self.log_stopped();
        }
    }

    /// Stops ticking and waits up to `timeout` for in-flight tick tasks.
    ///
    /// Unlike [`CaptureLoop::stop`] this waits for the ticker task to be torn
    /// down, so once it returns `true` no task of this loop holds the camera.
    pub async fn shutdown(&mut self, timeout: Duration) -> bool {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            // cancelled is the expected outcome
            let _ = ticker.await;
            self.log_stopped();
        }
        self.wait_for_in_flight(timeout).await
    }

    fn log_stopped(&self) {
        let stats = self.stats();
        tracing::info!(
            "Capture loop stopped: {} ticks, {} skipped, {} captured, {} capture failures, {} uploaded, {} upload failures, {} in flight",
            stats.ticks,
            stats.ticks_skipped,
            stats.frames_captured,
            stats.capture_failures,
            stats.uploads_succeeded,
            stats.uploads_failed,
            stats.uploads_in_flight
        );
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// Waits until no tick task is capturing or uploading. Returns `false` if
    /// some are still running when `timeout` elapses.
    pub async fn wait_for_in_flight(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = self.counters.idle.notified();
            tokio::pin!(idle);
            // register before checking so a wakeup between the two is not lost
            idle.as_mut().enable();

            if self.counters.in_flight.load(Ordering::Acquire) == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, idle).await.is_err() {
                return self.counters.in_flight.load(Ordering::Acquire) == 0;
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_ticker(
    camera: Arc<dyn CameraProvider>,
    api: ApiClient,
    settings: CaptureSettings,
    counters: Arc<Counters>,
    limiter: Option<Arc<Semaphore>>,
) {
    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let file_name: Arc<str> = Arc::from(settings.file_name.as_str());

    loop {
        interval.tick().await;
        let sequence = counters.ticks.fetch_add(1, Ordering::Relaxed) + 1;

        let permit = match &limiter {
            Some(limiter) => match Arc::clone(limiter).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    counters.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!("Tick {} skipped, upload limit reached", sequence);
                    continue;
                }
            },
            None => None,
        };

        let guard = InFlightGuard::enter(&counters);
        tokio::spawn(capture_and_upload(
            Arc::clone(&camera),
            api.clone(),
            Arc::clone(&file_name),
            sequence,
            guard,
            permit,
        ));
    }
}

async fn capture_and_upload(
    camera: Arc<dyn CameraProvider>,
    api: ApiClient,
    file_name: Arc<str>,
    sequence: u64,
    guard: InFlightGuard,
    _permit: Option<OwnedSemaphorePermit>,
) {
    let counters = &guard.counters;

    let captured = camera.capture().await;
    // the camera handle goes before the in-flight guard, so a drained loop
    // holds no reference to the device
    drop(camera);

    let frame = match captured {
        Ok(frame) => frame,
        Err(e) => {
            counters.capture_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Tick {}: capture failed: {}", sequence, e);
            return;
        }
    };
    counters.frames_captured.fetch_add(1, Ordering::Relaxed);

    match api.upload_image(&frame, &file_name, Some(sequence)).await {
        Ok(()) => {
            counters.uploads_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            counters.uploads_failed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Tick {}: upload failed: {}", sequence, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Frame;
    use crate::utils::error::{GuideError, Result};
    use std::sync::atomic::AtomicBool;

    struct FlagCamera {
        ready: AtomicBool,
    }

    #[async_trait::async_trait]
    impl CameraProvider for FlagCamera {
        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }

        async fn capture(&self) -> Result<Frame> {
            Err(GuideError::CaptureError {
                message: "no sensor".to_string(),
            })
        }
    }

    fn capture_loop(ready: bool) -> CaptureLoop {
        let camera = Arc::new(FlagCamera {
            ready: AtomicBool::new(ready),
        });
        let api = ApiClient::new("127.0.0.1:9").unwrap();
        CaptureLoop::new(camera, api, CaptureSettings::default())
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let mut capture = capture_loop(true);
        capture.stop();
        capture.stop();
        assert!(!capture.is_running());
        assert_eq!(capture.stats(), CaptureStats::default());
    }

    #[test]
    fn test_start_with_camera_not_ready_creates_no_timer() {
        // no runtime here: spawning would panic, so returning early is observable
        let mut capture = capture_loop(false);
        assert!(!capture.start());
        assert!(!capture.is_running());
    }

    #[tokio::test]
    async fn test_capture_failures_do_not_stop_loop() {
        let mut capture = capture_loop(true);
        assert!(capture.start());
        assert!(!capture.start());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(capture.is_running());
        capture.stop();
        assert!(capture.wait_for_in_flight(Duration::from_secs(1)).await);

        let stats = capture.stats();
        assert!(stats.ticks >= 2);
        assert!(stats.capture_failures >= 1);
        assert_eq!(stats.frames_captured, 0);
        assert_eq!(stats.uploads_succeeded + stats.uploads_failed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_leaves_no_task_holding_camera() {
        let camera = Arc::new(FlagCamera {
            ready: AtomicBool::new(true),
        });
        let api = ApiClient::new("127.0.0.1:9").unwrap();
        let mut capture = CaptureLoop::new(camera.clone(), api, CaptureSettings::default());

        assert!(capture.start());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(capture.shutdown(Duration::from_secs(1)).await);

        assert!(!capture.is_running());
        assert_eq!(capture.stats().uploads_in_flight, 0);
        // ours and the loop's
        assert_eq!(Arc::strong_count(&camera), 2);
    }
}
