use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{sync::watch, task::JoinHandle};
use tracing::error;

use crate::error::ScanError;

use super::ScanSummary;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanStatus {
    Running {
        batches_completed: u64,
        addresses_done: u64,
        total: u64,
    },
    Complete(ScanSummary),
    /// Stopped at a batch boundary because [`ScanJob::cancel`] was called.
    Cancelled(ScanSummary),
    /// The scan task itself panicked.
    Failed(String),
}

impl ScanStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, ScanStatus::Running { .. })
    }
}

/// Shared between a running scan and its [`ScanJob`].
pub struct JobControl {
    cancelled: AtomicBool,
    status: watch::Sender<ScanStatus>,
}

impl JobControl {
    pub fn new(total: u64) -> Arc<Self> {
        let (status, _) = watch::channel(ScanStatus::Running {
            batches_completed: 0,
            addresses_done: 0,
            total,
        });
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            status,
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn set_status(&self, status: ScanStatus) {
        // works even if nobody is subscribed
        self.status.send_replace(status);
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status.subscribe()
    }
}

/// Handle to a range scan running in the background.
pub struct ScanJob {
    control: Arc<JobControl>,
    status: watch::Receiver<ScanStatus>,
    /// Set once a finished status has been handed out by `next_status`.
    seen_finished: bool,
    handle: JoinHandle<Result<ScanSummary, ScanError>>,
}

impl ScanJob {
    pub fn spawn<F>(control: Arc<JobControl>, scan: F) -> Self
    where
        F: Future<Output = ScanSummary> + Send + 'static,
    {
        let status = control.subscribe();
        let scan = tokio::spawn(scan);

        let supervisor_control = control.clone();
        let handle = tokio::spawn(async move {
            match scan.await {
                Ok(summary) => {
                    supervisor_control.set_status(if summary.cancelled {
                        ScanStatus::Cancelled(summary.clone())
                    } else {
                        ScanStatus::Complete(summary.clone())
                    });
                    Ok(summary)
                }
                Err(err) => {
                    let reason = err.to_string();
                    error!("range scan task failed: {reason}");
                    supervisor_control.set_status(ScanStatus::Failed(reason.clone()));
                    Err(ScanError::TaskFailed(reason))
                }
            }
        });

        Self {
            control,
            status,
            seen_finished: false,
            handle,
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status.borrow().clone()
    }

    /// Wait for the status to change and return the new one. Returns `None`
    /// after the final status has been returned.
    pub async fn next_status(&mut self) -> Option<ScanStatus> {
        if self.seen_finished {
            return None;
        }
        self.status.changed().await.ok()?;
        let status = self.status.borrow_and_update().clone();
        self.seen_finished = status.is_finished();
        Some(status)
    }

    /// Ask the scan to stop. The batch that's currently running still
    /// finishes.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> Result<ScanSummary, ScanError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(ScanError::TaskFailed(err.to_string())),
        }
    }
}
