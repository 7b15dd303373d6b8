use clap::Parser;
use rc_guide::config::toml_config::TomlConfig;
use rc_guide::core::{Calibration, CameraProvider, ConfigProvider};
use rc_guide::utils::error::{ErrorSeverity, GuideError};
use rc_guide::utils::{logger, validation::Validate};
use rc_guide::{DirectoryCamera, Session};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "toml-session")]
#[command(about = "Run one guidance session described by a TOML file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "session.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override capture duration from config
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Validate the configuration and print a summary without contacting the server
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config file '{}': {}", args.config, e);
            eprintln!("Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    let verbose = args.verbose || config.verbose();
    logger::init_logger(config.log_format(), verbose);

    tracing::info!("Loaded configuration from: {}", args.config);

    if let Some(duration) = args.duration_secs {
        config.capture.duration_seconds = Some(duration);
        tracing::info!("Capture duration overridden to {}s", duration);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("Dry run, not contacting the server");
        return Ok(());
    }

    match run_session(&config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                "Session failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("{}", e.user_friendly_message());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 2,
                ErrorSeverity::Medium => 3,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 4,
            };
            std::process::exit(exit_code);
        }
    }
}

fn display_config_summary(config: &TomlConfig) {
    tracing::info!("Server: {}", config.server_address());
    tracing::info!(
        "Session: {} markers, {} cars, marker size {} cm",
        config.session.number_of_route_markers,
        config.session.number_of_cars,
        config.session.marker_size_cm
    );
    tracing::info!(
        "Capture: every {:?} from {}, {}, for {:?}",
        config.capture_interval(),
        config.frames_path(),
        config.upload_policy().describe(),
        config.duration()
    );
}

async fn run_session(config: &TomlConfig) -> Result<(), GuideError> {
    let calibration = Calibration::from_file(config.calibration_path())?;
    let camera: Arc<dyn CameraProvider> = Arc::new(DirectoryCamera::open(config.frames_path())?);
    let mut session = Session::from_config(config)?;

    if config.calibration_snapshot() {
        session.capture_calibration_frame(camera.as_ref()).await?;
    }

    session
        .initialize(&config.session_params(), &calibration)
        .await?;

    let stats = session
        .capture_for(camera, config.duration(), Duration::from_secs(5))
        .await?;
    tracing::info!(
        "Uploaded {} frames, {} failed, {} ticks skipped",
        stats.uploads_succeeded,
        stats.uploads_failed,
        stats.ticks_skipped
    );

    let standings = session.finish().await?;
    if standings.is_empty() {
        println!("No times reported yet");
    } else {
        print!("{}", standings);
    }
    Ok(())
}
