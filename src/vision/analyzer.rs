use crate::common::{Frame, Region};
use crate::error::VisionError;

/// Outcome of one completed analysis task. A region is present exactly when
/// something was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionResult {
    detected: bool,
    region: Option<Region>,
}

impl DetectionResult {
    pub fn found(region: Region) -> Self {
        Self {
            detected: true,
            region: Some(region),
        }
    }

    pub fn not_found() -> Self {
        Self {
            detected: false,
            region: None,
        }
    }

    pub fn detected(&self) -> bool {
        self.detected
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }
}

/// The image-processing collaborator the pipeline offloads frames to.
///
/// `analyze` runs on the background worker and may be slow. `annotate` runs on
/// the producer thread and draws whatever the analyzer last computed
/// internally, which can lag the published result by one frame.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, frame: &Frame) -> Result<DetectionResult, VisionError>;
    fn annotate(&self, frame: &mut Frame);
    fn name(&self) -> &'static str;
}
