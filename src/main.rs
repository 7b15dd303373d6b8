use clap::Parser;
use rc_guide::config::Command;
use rc_guide::core::{Calibration, CameraProvider, ConfigProvider, Standings};
use rc_guide::utils::error::{ErrorSeverity, GuideError};
use rc_guide::utils::{logger, validation::Validate};
use rc_guide::{ApiClient, CliConfig, DirectoryCamera, Session};
use std::sync::Arc;
use std::time::Duration;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting rc-guide CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&config).await {
        tracing::error!(
            "Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("{}", e.user_friendly_message());
        eprintln!("Suggestion: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 2,
            ErrorSeverity::Medium => 3,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 4,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(config: &CliConfig) -> Result<(), GuideError> {
    let api = ApiClient::from_config(config)?;
    let settings = config.capture_settings();

    match &config.command {
        Command::Init(init) => {
            let calibration = Calibration::from_file(&init.calibration)?;
            let mut session = Session::new(api, settings);
            session
                .initialize(&init.session_params(), &calibration)
                .await?;
            println!("Session initialized on {}", session.api().base_url());
        }
        Command::Snapshot { frames } => {
            let camera = DirectoryCamera::open(frames)?;
            let session = Session::new(api, settings);
            session.capture_calibration_frame(&camera).await?;
            camera.release();
            println!("Calibration frame uploaded");
        }
        Command::Stream {
            frames,
            duration_secs,
        } => {
            let mut session = Session::attach(api, settings);
            stream(&mut session, frames, Duration::from_secs(*duration_secs)).await?;
            session.end();
        }
        Command::Times => {
            let mut session = Session::attach(api, settings);
            let standings = session.finish().await?;
            print_standings(&standings);
        }
        Command::Run {
            init,
            frames,
            duration_secs,
        } => {
            let calibration = Calibration::from_file(&init.calibration)?;
            let mut session = Session::new(api, settings);
            session
                .initialize(&init.session_params(), &calibration)
                .await?;
            println!("Session initialized on {}", session.api().base_url());

            stream(&mut session, frames, Duration::from_secs(*duration_secs)).await?;

            let standings = session.finish().await?;
            print_standings(&standings);
        }
    }

    Ok(())
}

async fn stream(session: &mut Session, frames: &str, duration: Duration) -> Result<(), GuideError> {
    let camera: Arc<dyn CameraProvider> = Arc::new(DirectoryCamera::open(frames)?);
    println!("Streaming frames for {:?} (Ctrl-C to stop early)", duration);

    tokio::select! {
        result = session.capture_for(camera, duration, DRAIN_TIMEOUT) => {
            let stats = result?;
            println!(
                "Sent {} of {} frames ({} upload failures, {} capture failures, {} ticks skipped)",
                stats.uploads_succeeded,
                stats.frames_captured,
                stats.uploads_failed,
                stats.capture_failures,
                stats.ticks_skipped
            );
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping capture");
            session.stop_capture();
            session.drain_uploads(DRAIN_TIMEOUT).await;
        }
    }

    Ok(())
}

fn print_standings(standings: &Standings) {
    if standings.is_empty() {
        println!("No times reported yet");
    } else {
        print!("{}", standings);
    }
}
