use std::path::PathBuf;
use std::sync::Arc;

use skystone_vision::config::Configuration;
use skystone_vision::error::AppError;
use skystone_vision::intake::ImageDirectorySource;
use skystone_vision::opmode::{run_opmode, SkystoneAutonomous};
use skystone_vision::telemetry::DataLogger;
use skystone_vision::vision::NativeVision;
use tokio_util::sync::CancellationToken;

fn init_logging(configuration: &Configuration) {
    tracing_subscriber::fmt()
        .with_max_level(configuration.max_level())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let configuration = Configuration::load()?;
    init_logging(&configuration);

    // A directory given on the command line wins over the configured one.
    let frames_dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| configuration.frames_dir.clone())
        .ok_or_else(|| config::ConfigError::NotFound("frames_dir".to_string()))?;

    let vision = NativeVision::init(&configuration.vision_library)?;
    let source = ImageDirectorySource::open(&frames_dir)?;

    let logger = Arc::new(DataLogger::new());
    let sampler_token = CancellationToken::new();
    let sampler = logger
        .clone()
        .spawn_sampler(configuration.telemetry_period(), sampler_token.clone());

    let mut opmode = SkystoneAutonomous::new(vision, logger.clone(), source)
        .with_frame_period(configuration.frame_period());
    let outcome = tokio::task::spawn_blocking(move || run_opmode(&mut opmode)).await;

    sampler_token.cancel();
    if let Err(e) = sampler.await {
        tracing::warn!("Telemetry sampler ended abnormally: {}", e);
    }
    logger.log_snapshot();

    match outcome {
        Ok(result) => result,
        Err(e) => Err(AppError::OpMode("Skystone Autonomous", e.to_string())),
    }
}
