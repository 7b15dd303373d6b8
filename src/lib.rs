pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::TomlConfig;

pub use adapters::DirectoryCamera;
pub use core::{
    api::ApiClient,
    capture_loop::CaptureLoop,
    ordering::{order_results, parse_time_token, TimingSheet},
    session::Session,
};
pub use utils::error::{GuideError, Result};
