use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::opmode::OpMode;

pub const CALIBRATION_FILE: &str = "imu_calibration.json";

/// The inertial sensor as the recalibrator drives it.
pub trait Imu: Send {
    fn initialize(&mut self) -> Result<(), AppError>;
    fn start(&mut self) -> Result<(), AppError>;
    fn stop(&mut self) -> Result<(), AppError>;
}

/// Throws away the stored IMU calibration so the sensor calibrates from
/// scratch on its next initialisation.
pub struct ImuRecalibrator<I> {
    imu: I,
    storage_dir: PathBuf,
}

impl<I: Imu> ImuRecalibrator<I> {
    pub fn new(imu: I, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            imu,
            storage_dir: storage_dir.into(),
        }
    }

    pub fn calibration_path(&self) -> PathBuf {
        self.storage_dir.join(CALIBRATION_FILE)
    }

    pub fn imu(&self) -> &I {
        &self.imu
    }

    fn delete_calibration(path: &Path) {
        tracing::debug!("Deleting old calibration file {}", path.display());
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!("Deleted calibration file {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("No calibration file at {}", path.display())
            }
            Err(e) => tracing::warn!("Unable to delete calibration: {}", e),
        }
    }
}

impl<I: Imu> OpMode for ImuRecalibrator<I> {
    fn name(&self) -> &'static str {
        "IMU Recalibration"
    }

    fn initialize(&mut self) -> Result<(), AppError> {
        Self::delete_calibration(&self.calibration_path());
        tracing::debug!("Initializing IMU");
        self.imu.initialize()
    }

    fn run(&mut self) -> Result<(), AppError> {
        tracing::debug!("Starting IMU");
        self.imu.start()
    }

    fn finish(&mut self) -> Result<(), AppError> {
        self.imu.stop()
    }
}
