use std::sync::Arc;
use std::time::Duration;

use crate::error::AppError;
use crate::intake::FrameSource;
use crate::opmode::OpMode;
use crate::telemetry::TelemetrySink;
use crate::vision::{Analyzer, SkystoneDetector};

/// Autonomous routine that streams camera frames through the skystone
/// detector for as long as the source produces them.
pub struct SkystoneAutonomous<S> {
    analyzer: Arc<dyn Analyzer>,
    telemetry: Arc<dyn TelemetrySink>,
    source: S,
    frame_period: Option<Duration>,
    detector: Option<SkystoneDetector>,
    frames_seen: usize,
}

impl<S: FrameSource> SkystoneAutonomous<S> {
    pub fn new(analyzer: Arc<dyn Analyzer>, telemetry: Arc<dyn TelemetrySink>, source: S) -> Self {
        Self {
            analyzer,
            telemetry,
            source,
            frame_period: None,
            detector: None,
            frames_seen: 0,
        }
    }

    // Paces replayed sources to a camera's frame rate.
    pub fn with_frame_period(mut self, frame_period: Duration) -> Self {
        self.frame_period = Some(frame_period);
        self
    }

    pub fn detector(&self) -> Option<&SkystoneDetector> {
        self.detector.as_ref()
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }
}

impl<S: FrameSource> OpMode for SkystoneAutonomous<S> {
    fn name(&self) -> &'static str {
        "Skystone Autonomous"
    }

    fn initialize(&mut self) -> Result<(), AppError> {
        let detector = SkystoneDetector::new(self.analyzer.clone())?;
        detector.register_telemetry(self.telemetry.as_ref());
        self.detector = Some(detector);
        Ok(())
    }

    fn run(&mut self) -> Result<(), AppError> {
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| AppError::OpMode("Skystone Autonomous", "not initialized".to_string()))?;

        while let Some(frame) = self.source.next_frame() {
            match frame {
                Ok(frame) => {
                    detector.on_frame(&frame);
                    let _annotated = detector.draw(frame);
                    self.frames_seen += 1;
                }
                Err(e) => tracing::warn!("Skipping unreadable frame: {}", e),
            }
            if let Some(period) = self.frame_period {
                std::thread::sleep(period);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AppError> {
        if let Some(detector) = self.detector.as_mut() {
            detector.stop();
            tracing::info!(
                "Processed {} frames, skystone found: {}, center: {:?}",
                self.frames_seen,
                detector.found(),
                detector.center()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Frame, Point, Region};
    use crate::telemetry::DataLogger;
    use crate::vision::skystone_detector::CHANNEL_DETECTED;
    use crate::vision::testing::{test_frame, wait_for, GatedAnalyzer, Step};
    use std::collections::VecDeque;

    struct QueuedSource {
        frames: VecDeque<Result<Frame, AppError>>,
    }

    impl FrameSource for QueuedSource {
        fn next_frame(&mut self) -> Option<Result<Frame, AppError>> {
            self.frames.pop_front()
        }
    }

    #[test]
    fn initialize_registers_telemetry() {
        let analyzer = Arc::new(GatedAnalyzer::new());
        let logger = Arc::new(DataLogger::new());
        let mut opmode = SkystoneAutonomous::new(
            analyzer,
            logger.clone(),
            QueuedSource {
                frames: VecDeque::new(),
            },
        );
        opmode.initialize().unwrap();
        assert_eq!(logger.read(CHANNEL_DETECTED).as_deref(), Some("0"));
        assert!(opmode.detector().unwrap().is_enabled());
    }

    #[test]
    fn run_before_initialize_fails() {
        let mut opmode = SkystoneAutonomous::new(
            Arc::new(GatedAnalyzer::new()),
            Arc::new(DataLogger::new()),
            QueuedSource {
                frames: VecDeque::new(),
            },
        );
        assert!(matches!(opmode.run(), Err(AppError::OpMode(_, _))));
    }

    #[test]
    fn streams_frames_and_skips_unreadable_ones() {
        let analyzer = Arc::new(GatedAnalyzer::new());
        let logger = Arc::new(DataLogger::new());
        let frames = VecDeque::from(vec![
            Ok(test_frame()),
            Err(AppError::InvalidFrame("torn".to_string())),
            Ok(test_frame()),
        ]);
        let mut opmode = SkystoneAutonomous::new(analyzer.clone(), logger, QueuedSource { frames });

        opmode.initialize().unwrap();
        opmode.run().unwrap();
        assert_eq!(opmode.frames_seen(), 2);
        assert_eq!(analyzer.annotated(), 2);

        analyzer.wait_started();
        analyzer.release(Step::NotFound);
        opmode.finish().unwrap();
    }

    #[test]
    fn result_cancelled_at_finish_is_never_published() {
        let analyzer = Arc::new(GatedAnalyzer::new());
        let logger = Arc::new(DataLogger::new());
        let frames = VecDeque::from(vec![Ok(test_frame())]);
        let mut opmode =
            SkystoneAutonomous::new(analyzer.clone(), logger.clone(), QueuedSource { frames });
        opmode.initialize().unwrap();
        opmode.run().unwrap();
        analyzer.wait_started();
        opmode.finish().unwrap();

        analyzer.release(Step::Found(Region::from_origin(10, 20, 5, 7)));
        let detector = opmode.detector.as_mut().unwrap();
        assert!(wait_for(|| detector.analysis_finished()));
        detector.on_frame(&test_frame());
        assert!(!detector.found());

        analyzer.wait_started();
        analyzer.release(Step::Found(Region::from_origin(10, 20, 5, 7)));
        assert!(wait_for(|| detector.analysis_finished()));
        detector.on_frame(&test_frame());
        assert_eq!(detector.center(), Some(Point::new(12, 23)));
        assert_eq!(logger.read(CHANNEL_DETECTED).as_deref(), Some("1"));
        analyzer.wait_started();
        analyzer.release(Step::NotFound);
    }
}
