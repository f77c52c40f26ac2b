//! Scripted analyzer for driving the worker deterministically in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use uuid::Uuid;

use crate::common::{Frame, Region};
use crate::error::VisionError;
use crate::vision::analyzer::{Analyzer, DetectionResult};

pub enum Step {
    Found(Region),
    NotFound,
    Fail(i32),
    Panic,
}

/// Each `analyze` call announces itself, then blocks until the test releases
/// it with a `Step`.
pub struct GatedAnalyzer {
    started_tx: mpsc::UnboundedSender<Uuid>,
    started_rx: Mutex<mpsc::UnboundedReceiver<Uuid>>,
    step_tx: mpsc::UnboundedSender<Step>,
    step_rx: Mutex<mpsc::UnboundedReceiver<Step>>,
    analyzed: AtomicUsize,
    annotated: AtomicUsize,
}

impl GatedAnalyzer {
    pub fn new() -> Self {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let (step_tx, step_rx) = mpsc::unbounded_channel();
        Self {
            started_tx,
            started_rx: Mutex::new(started_rx),
            step_tx,
            step_rx: Mutex::new(step_rx),
            analyzed: AtomicUsize::new(0),
            annotated: AtomicUsize::new(0),
        }
    }

    /// Waits up to five seconds for the worker to enter `analyze`; returns
    /// the frame id.
    pub fn wait_started(&self) -> Uuid {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut started_rx = self.started_rx.lock();
        loop {
            match started_rx.try_recv() {
                Ok(frame_id) => return frame_id,
                Err(TryRecvError::Disconnected) => panic!("analyzer dropped"),
                Err(TryRecvError::Empty) if Instant::now() >= deadline => {
                    panic!("analyzer never started")
                }
                Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(1)),
            }
        }
    }

    pub fn release(&self, step: Step) {
        self.step_tx.send(step).expect("analyzer dropped");
    }

    pub fn analyzed(&self) -> usize {
        self.analyzed.load(Ordering::SeqCst)
    }

    pub fn annotated(&self) -> usize {
        self.annotated.load(Ordering::SeqCst)
    }
}

impl Analyzer for GatedAnalyzer {
    fn analyze(&self, frame: &Frame) -> Result<DetectionResult, VisionError> {
        self.analyzed.fetch_add(1, Ordering::SeqCst);
        let _ = self.started_tx.send(frame.frame_id());
        let step = self.step_rx.lock().blocking_recv();
        match step {
            Some(Step::Found(region)) => Ok(DetectionResult::found(region)),
            Some(Step::NotFound) | None => Ok(DetectionResult::not_found()),
            Some(Step::Fail(status)) => Err(VisionError::AnalysisFailed(status)),
            Some(Step::Panic) => panic!("scripted analyzer panic"),
        }
    }

    fn annotate(&self, frame: &mut Frame) {
        self.annotated.fetch_add(1, Ordering::SeqCst);
        frame.image_mut().put_pixel(0, 0, Rgb([255, 0, 0]));
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

pub fn test_frame() -> Frame {
    Frame::new(RgbImage::from_pixel(8, 8, Rgb([10, 20, 30])))
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}
