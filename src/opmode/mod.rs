pub mod imu_recalibrator;
pub mod skystone_autonomous;

pub use imu_recalibrator::{Imu, ImuRecalibrator};
pub use skystone_autonomous::SkystoneAutonomous;

use crate::error::AppError;

/// Lifecycle hooks a host calls in order: `initialize`, `run`, `finish`.
pub trait OpMode {
    fn name(&self) -> &'static str;
    fn initialize(&mut self) -> Result<(), AppError>;
    fn run(&mut self) -> Result<(), AppError>;
    fn finish(&mut self) -> Result<(), AppError>;
}

/// Drives one opmode through its lifecycle. `finish` always runs once
/// `initialize` succeeded; a `run` error wins over a `finish` error.
pub fn run_opmode(opmode: &mut dyn OpMode) -> Result<(), AppError> {
    tracing::info!("Initializing opmode '{}'", opmode.name());
    opmode.initialize()?;

    tracing::info!("Running opmode '{}'", opmode.name());
    let run_result = opmode.run();
    if let Err(e) = &run_result {
        tracing::error!("Opmode '{}' failed: {}", opmode.name(), e);
    }

    tracing::info!("Finishing opmode '{}'", opmode.name());
    let finish_result = opmode.finish();
    run_result.and(finish_result)
}
