pub mod api;
pub mod calibration;
pub mod capture_loop;
pub mod ordering;
pub mod session;

pub use crate::domain::model::{
    Calibration, CaptureSettings, CaptureStats, FinishTime, Frame, RankedEntry, SessionParams,
    SessionState, Standings, TimingEntry, UploadPolicy,
};
pub use crate::domain::ports::{CameraProvider, ConfigProvider};
pub use crate::utils::error::Result;
