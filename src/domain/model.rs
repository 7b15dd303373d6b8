use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle of one tracking run against a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Active,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Values the operator enters before a session starts. Kept as text because the
/// server accepts decimal strings as typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionParams {
    pub number_of_route_markers: String,
    pub number_of_cars: String,
    pub marker_size_cm: String,
}

impl SessionParams {
    pub fn new(
        number_of_route_markers: impl Into<String>,
        number_of_cars: impl Into<String>,
        marker_size_cm: impl Into<String>,
    ) -> Self {
        Self {
            number_of_route_markers: number_of_route_markers.into(),
            number_of_cars: number_of_cars.into(),
            marker_size_cm: marker_size_cm.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub camera_matrix: serde_json::Value,
    pub dist_coeffs: serde_json::Value,
}

/// One encoded image from the camera.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            captured_at: Utc::now(),
        }
    }

    /// Time since capture, zero if the clock went backwards.
    pub fn age(&self) -> chrono::Duration {
        (Utc::now() - self.captured_at).max(chrono::Duration::zero())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub id: String,
    pub token: String,
}

impl TimingEntry {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
        }
    }
}

/// Parsed form of a raw time token. `Unfinished` sorts after every finished time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinishTime {
    Finished(f64),
    Unfinished,
}

impl FinishTime {
    pub fn is_finished(&self) -> bool {
        matches!(self, FinishTime::Finished(_))
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            FinishTime::Finished(seconds) => Some(*seconds),
            FinishTime::Unfinished => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub id: String,
    pub token: String,
    pub label: String,
}

/// Ranked view over a timing sheet: finished vehicles by ascending time, then
/// vehicles that have not finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub entries: Vec<RankedEntry>,
}

impl Standings {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedEntry> {
        self.entries.iter()
    }

    /// The ranked entries as plain timing entries, in ranked order.
    pub fn timing_entries(&self) -> Vec<TimingEntry> {
        self.entries
            .iter()
            .map(|entry| TimingEntry::new(entry.id.clone(), entry.token.clone()))
            .collect()
    }
}

impl fmt::Display for Standings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}. {}: {}", entry.rank, entry.id, entry.label)?;
        }
        Ok(())
    }
}

/// How many uploads may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadPolicy {
    /// Every tick uploads regardless of earlier uploads.
    Unbounded,
    Bounded(usize),
    AtMostOne,
}

impl UploadPolicy {
    /// `0` means unbounded, `1` at most one in flight.
    pub fn from_max_in_flight(max_in_flight: usize) -> Self {
        match max_in_flight {
            0 => UploadPolicy::Unbounded,
            1 => UploadPolicy::AtMostOne,
            n => UploadPolicy::Bounded(n),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            UploadPolicy::Unbounded => "unbounded uploads".to_string(),
            UploadPolicy::Bounded(n) => format!("at most {} uploads in flight", n),
            UploadPolicy::AtMostOne => "at most one upload in flight".to_string(),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            UploadPolicy::Unbounded => None,
            UploadPolicy::Bounded(n) => Some((*n).max(1)),
            UploadPolicy::AtMostOne => Some(1),
        }
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        UploadPolicy::Bounded(4)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub interval: Duration,
    pub policy: UploadPolicy,
    pub file_name: String,
    /// How long teardown waits for tick tasks before giving up on them.
    pub drain_timeout: Duration,
}

impl CaptureSettings {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);
    pub const DEFAULT_FILE_NAME: &'static str = "frame.jpg";
    pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            policy: UploadPolicy::default(),
            file_name: Self::DEFAULT_FILE_NAME.to_string(),
            drain_timeout: Self::DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Counters of a capture loop at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub ticks: u64,
    pub ticks_skipped: u64,
    pub frames_captured: u64,
    pub capture_failures: u64,
    pub uploads_succeeded: u64,
    pub uploads_failed: u64,
    pub uploads_in_flight: u64,
}
