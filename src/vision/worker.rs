use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::common::Frame;
use crate::error::{AppError, TaskError};
use crate::vision::analyzer::{Analyzer, DetectionResult};

type TaskOutcome = Result<DetectionResult, TaskError>;

struct AnalysisTask {
    frame: Frame,
    cancel_token: CancellationToken,
    result_tx: oneshot::Sender<TaskOutcome>,
}

/// Handle to one submitted analysis task.
pub struct PendingAnalysis {
    frame_id: Uuid,
    captured_at: DateTime<Utc>,
    cancel_token: CancellationToken,
    state: TaskState,
}

enum TaskState {
    Running(oneshot::Receiver<TaskOutcome>),
    Finished(TaskOutcome),
}

impl PendingAnalysis {
    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Non-blocking completion check. Once it returns true it keeps returning
    /// true and the outcome is held until `outcome` takes it.
    pub fn is_finished(&mut self) -> bool {
        let TaskState::Running(result_rx) = &mut self.state else {
            return true;
        };
        let outcome = match result_rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::error::TryRecvError::Empty) => return false,
            Err(oneshot::error::TryRecvError::Closed) => {
                if self.cancel_token.is_cancelled() {
                    Err(TaskError::Cancelled)
                } else {
                    Err(TaskError::WorkerGone)
                }
            }
        };
        self.state = TaskState::Finished(outcome);
        true
    }

    /// Requests cancellation without waiting for the worker. A task that has
    /// not finished yet counts as finished-cancelled from here on, even if the
    /// analyzer call it is stuck in keeps running.
    pub fn cancel(&mut self) {
        if self.is_finished() {
            return;
        }
        self.cancel_token.cancel();
        self.state = TaskState::Finished(Err(TaskError::Cancelled));
    }

    pub fn outcome(self) -> Option<TaskOutcome> {
        match self.state {
            TaskState::Running(_) => None,
            TaskState::Finished(outcome) => Some(outcome),
        }
    }
}

/// A single dedicated analysis thread fed through a channel of depth one.
pub struct AnalysisWorker {
    task_tx: mpsc::Sender<AnalysisTask>,
    shutdown_token: CancellationToken,
    // Detached; the thread exits on its own once the channel closes.
    _worker_thread: JoinHandle<()>,
}

impl AnalysisWorker {
    pub fn spawn(analyzer: Arc<dyn Analyzer>) -> Result<Self, AppError> {
        let (task_tx, task_rx) = mpsc::channel(1);
        let shutdown_token = CancellationToken::new();
        let token = shutdown_token.clone();
        let worker_thread = std::thread::Builder::new()
            .name("skystone-analysis".to_string())
            .spawn(move || run(analyzer, task_rx, token))?;

        Ok(Self {
            task_tx,
            shutdown_token,
            _worker_thread: worker_thread,
        })
    }

    /// Hands `frame` to the worker without blocking. Returns `Ok(None)` when
    /// the slot is still occupied and the frame was dropped.
    pub fn submit(&self, frame: Frame) -> Result<Option<PendingAnalysis>, TaskError> {
        let frame_id = frame.frame_id();
        let captured_at = frame.captured_at();
        let cancel_token = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        let task = AnalysisTask {
            frame,
            cancel_token: cancel_token.clone(),
            result_tx,
        };

        match self.task_tx.try_send(task) {
            Ok(()) => Ok(Some(PendingAnalysis {
                frame_id,
                captured_at,
                cancel_token,
                state: TaskState::Running(result_rx),
            })),
            Err(TrySendError::Full(_)) => {
                // Drop frame to keep real-time
                tracing::debug!("Dropping frame {}: analysis slot full", frame_id);
                Ok(None)
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!("Analysis worker is gone, cannot analyze frame {}", frame_id);
                Err(TaskError::WorkerGone)
            }
        }
    }
}

impl Drop for AnalysisWorker {
    // The sender closes with `self`, so the thread exits after its current task.
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

fn run(
    analyzer: Arc<dyn Analyzer>,
    mut task_rx: mpsc::Receiver<AnalysisTask>,
    shutdown_token: CancellationToken,
) {
    tracing::info!("Analysis worker started with analyzer '{}'", analyzer.name());
    while let Some(task) = task_rx.blocking_recv() {
        if shutdown_token.is_cancelled() {
            break;
        }
        process(analyzer.as_ref(), task);
    }
    tracing::info!("Analysis worker stopped");
}

fn process(analyzer: &dyn Analyzer, task: AnalysisTask) {
    let AnalysisTask {
        frame,
        cancel_token,
        result_tx,
    } = task;
    let frame_id = frame.frame_id();

    if cancel_token.is_cancelled() {
        tracing::debug!("Skipping cancelled analysis of frame {}", frame_id);
        return;
    }

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(&frame))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => {
            tracing::warn!("Analyzer '{}' failed on frame {}: {}", analyzer.name(), frame_id, e);
            Ok(DetectionResult::not_found())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Analyzer '{}' panicked on frame {}: {}", analyzer.name(), frame_id, message);
            Err(TaskError::Failed(message))
        }
    };
    drop(frame);

    if cancel_token.is_cancelled() {
        tracing::debug!("Discarding result of cancelled analysis of frame {}", frame_id);
        return;
    }
    // The receiver is gone when the pipeline was torn down; nothing to do then.
    let _ = result_tx.send(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
