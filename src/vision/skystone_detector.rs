use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use crate::common::{Frame, Point, Region};
use crate::error::AppError;
use crate::telemetry::TelemetrySink;
use crate::vision::analyzer::{Analyzer, DetectionResult};
use crate::vision::worker::{AnalysisWorker, PendingAnalysis};

pub const CHANNEL_DETECTED: &str = "Skystone detected";
pub const CHANNEL_WIDTH: &str = "Skystone width";
pub const CHANNEL_HEIGHT: &str = "Skystone height";
pub const CHANNEL_CENTER_X: &str = "Skystone center X";
pub const CHANNEL_CENTER_Y: &str = "Skystone center Y";

/// Feeds camera frames to a single background analysis slot and publishes
/// the latest completed detection.
///
/// All methods run on the producer thread. The published result is the only
/// state other threads see, through telemetry channels holding watch
/// receivers.
pub struct SkystoneDetector {
    analyzer: Arc<dyn Analyzer>,
    worker: AnalysisWorker,
    pending: Option<PendingAnalysis>,
    result_tx: watch::Sender<Option<DetectionResult>>,
    enabled: bool,
}

impl SkystoneDetector {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Result<Self, AppError> {
        let worker = AnalysisWorker::spawn(analyzer.clone())?;
        let (result_tx, _) = watch::channel(None);
        Ok(Self {
            analyzer,
            worker,
            pending: None,
            result_tx,
            enabled: true,
        })
    }

    /// Publishes the previous task's result if it has finished, then submits
    /// a copy of `frame` when the slot is free and the detector is enabled.
    /// Frames arriving while the slot is busy are dropped.
    pub fn on_frame(&mut self, frame: &Frame) {
        self.drain_finished();

        if self.pending.is_some() {
            tracing::trace!("Dropping frame {}: analysis in flight", frame.frame_id());
            return;
        }
        if !self.enabled {
            return;
        }

        match self.worker.submit(frame.clone()) {
            Ok(pending) => {
                if let Some(pending) = &pending {
                    tracing::debug!("Submitted frame {} for analysis", pending.frame_id());
                }
                self.pending = pending;
            }
            Err(e) => tracing::error!("Failed to submit frame {}: {}", frame.frame_id(), e),
        }
    }

    fn drain_finished(&mut self) {
        let finished = self
            .pending
            .as_mut()
            .is_some_and(|pending| pending.is_finished());
        if !finished {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };
        let frame_id = pending.frame_id();
        let age = Utc::now() - pending.captured_at();

        match pending.outcome() {
            Some(Ok(result)) if self.enabled => {
                tracing::debug!(
                    "Publishing result for frame {} captured {} ms ago",
                    frame_id,
                    age.num_milliseconds()
                );
                self.result_tx.send_replace(Some(result));
            }
            Some(Ok(_)) => {
                tracing::debug!("Ignoring result for frame {} while disabled", frame_id);
            }
            Some(Err(e)) => {
                tracing::warn!("No detection update from frame {}: {}", frame_id, e);
            }
            None => {}
        }
    }

    /// Requests cancellation of the in-flight task, if any. Does not wait.
    pub fn stop(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            tracing::info!("Cancelling analysis of frame {}", pending.frame_id());
            pending.cancel();
        }
    }

    /// Lets the analyzer draw its last detection onto `frame` when enabled.
    pub fn draw(&self, mut frame: Frame) -> Frame {
        if self.enabled {
            self.analyzer.annotate(&mut frame);
        }
        frame
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stops new submissions and forgets the last detection at once.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.result_tx.send_replace(None);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_result(&self) -> Option<DetectionResult> {
        *self.result_tx.borrow()
    }

    pub fn found(&self) -> bool {
        found(&self.result_tx.borrow())
    }

    pub fn region(&self) -> Option<Region> {
        region(&self.result_tx.borrow())
    }

    pub fn center(&self) -> Option<Point> {
        self.region().map(|region| region.center())
    }

    /// True when no task is in flight or the in-flight one has completed.
    /// Does not publish anything; that happens on the next `on_frame`.
    pub fn analysis_finished(&mut self) -> bool {
        self.pending
            .as_mut()
            .map_or(true, |pending| pending.is_finished())
    }

    pub fn register_telemetry(&self, sink: &dyn TelemetrySink) {
        let result_rx = self.result_tx.subscribe();
        sink.add_channel(
            CHANNEL_DETECTED,
            Box::new(move || {
                let detected = if found(&result_rx.borrow()) { "1" } else { "0" };
                detected.to_string()
            }),
        );
        self.add_region_channel(sink, CHANNEL_WIDTH, |region| region.width());
        self.add_region_channel(sink, CHANNEL_HEIGHT, |region| region.height());
        self.add_region_channel(sink, CHANNEL_CENTER_X, |region| region.center().x);
        self.add_region_channel(sink, CHANNEL_CENTER_Y, |region| region.center().y);
    }

    fn add_region_channel(
        &self,
        sink: &dyn TelemetrySink,
        name: &str,
        value: fn(&Region) -> i32,
    ) {
        let result_rx = self.result_tx.subscribe();
        sink.add_channel(
            name,
            Box::new(move || {
                region(&result_rx.borrow())
                    .map_or(0, |region| value(&region))
                    .to_string()
            }),
        );
    }
}

fn found(result: &Option<DetectionResult>) -> bool {
    result.is_some_and(|result| result.detected())
}

fn region(result: &Option<DetectionResult>) -> Option<Region> {
    result.filter(|result| result.detected()).and_then(|result| result.region())
}
