use crate::core::{ConfigProvider, SessionParams, UploadPolicy};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_server_address, Validate,
};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "rc-guide")]
#[command(about = "Session client for the RC vehicle guidance server")]
pub struct CliConfig {
    /// Server IP or host; port 5000 is used unless one is given
    #[arg(long, short)]
    pub server: String,

    #[arg(long, default_value = "10", help = "Milliseconds between captures")]
    pub interval_ms: u64,

    #[arg(
        long,
        default_value = "4",
        help = "Uploads allowed in flight at once (0 = unbounded)"
    )]
    pub max_in_flight: usize,

    #[arg(long, help = "Per-request timeout in seconds")]
    pub timeout_secs: Option<u64>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create a tracking session on the server
    Init(InitArgs),

    /// Capture one frame and upload it for calibration
    Snapshot {
        #[arg(long, help = "Image file or directory of images")]
        frames: String,
    },

    /// Stream frames to an already initialized session
    Stream {
        #[arg(long, help = "Image file or directory of images")]
        frames: String,

        #[arg(long, default_value = "30")]
        duration_secs: u64,
    },

    /// Fetch and rank completion times
    Times,

    /// Initialize, stream, then print the standings
    Run {
        #[command(flatten)]
        init: InitArgs,

        #[arg(long, help = "Image file or directory of images")]
        frames: String,

        #[arg(long, default_value = "30")]
        duration_secs: u64,
    },
}

#[derive(Debug, Clone, Args)]
pub struct InitArgs {
    #[arg(long = "markers")]
    pub number_of_route_markers: String,

    #[arg(long = "cars")]
    pub number_of_cars: String,

    #[arg(long = "marker-size")]
    pub marker_size_cm: String,

    #[arg(long, default_value = "assets/calibration.json")]
    pub calibration: String,
}

impl InitArgs {
    pub fn session_params(&self) -> SessionParams {
        SessionParams::new(
            self.number_of_route_markers.clone(),
            self.number_of_cars.clone(),
            self.marker_size_cm.clone(),
        )
    }
}

impl ConfigProvider for CliConfig {
    fn server_address(&self) -> &str {
        &self.server
    }

    fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy::from_max_in_flight(self.max_in_flight)
    }

    fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_server_address("server", &self.server)?;
        validate_positive_number("interval_ms", self.interval_ms, 1)?;
        if let Some(timeout) = self.timeout_secs {
            validate_positive_number("timeout_secs", timeout, 1)?;
        }

        match &self.command {
            Command::Init(init) => init.validate(),
            Command::Snapshot { frames } => validate_path("frames", frames),
            Command::Stream {
                frames,
                duration_secs,
            } => {
                validate_path("frames", frames)?;
                validate_positive_number("duration_secs", *duration_secs, 1)
            }
            Command::Times => Ok(()),
            Command::Run {
                init,
                frames,
                duration_secs,
            } => {
                init.validate()?;
                validate_path("frames", frames)?;
                validate_positive_number("duration_secs", *duration_secs, 1)
            }
        }
    }
}

impl Validate for InitArgs {
    fn validate(&self) -> Result<()> {
        self.session_params().validate()?;
        validate_path("calibration", &self.calibration)
    }
}
