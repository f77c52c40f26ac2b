pub mod analyzer;
pub mod native;
pub mod skystone_detector;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{Analyzer, DetectionResult};
pub use native::NativeVision;
pub use skystone_detector::SkystoneDetector;
pub use worker::{AnalysisWorker, PendingAnalysis};
