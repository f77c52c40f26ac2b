pub mod common;
pub mod config;
pub mod error;
pub mod intake;
pub mod opmode;
pub mod telemetry;
pub mod vision;

pub use error::{AppError, TaskError, VisionError};

pub use common::{Frame, Point, Region};
pub use telemetry::{DataLogger, TelemetrySink};
pub use vision::{Analyzer, DetectionResult, NativeVision, SkystoneDetector};
