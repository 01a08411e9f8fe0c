//! The background owner of queue draining.
//!
//! Exactly one [`QueueWorker`] runs per process. It drains the queue whenever it is
//! triggered (after a submission or from the manual endpoint) and on a fallback
//! interval, and stops when its cancellation token fires. Request handlers only
//! nudge it through a [`WorkerHandle`]; they never process jobs themselves.

use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::processor::{ProcessOutcome, QueueProcessor};

/// Cheap, cloneable handle used to wake or stop the worker.
#[derive(Clone, Default)]
pub struct WorkerHandle {
    notify: Arc<Notify>,
    shutdown: CancellationToken,
}

impl WorkerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to drain the queue now. Triggers while it is busy coalesce.
    pub fn trigger(&self) {
        self.notify.notify_one();
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

pub struct QueueWorker {
    processor: QueueProcessor,
    handle: WorkerHandle,
    poll_interval: Duration,
}

impl QueueWorker {
    pub fn new(processor: QueueProcessor, handle: WorkerHandle, poll_interval: Duration) -> Self {
        Self {
            processor,
            handle,
            poll_interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!("Queue worker started (poll every {:?})", self.poll_interval);
        match self.processor.recover_interrupted().await {
            Ok(Some(id)) => info!("Marked interrupted generation {} failed", id),
            Ok(None) => {}
            Err(e) => error!("Could not recover interrupted generations: {}", e),
        }
        loop {
            self.drain().await;

            tokio::select! {
                _ = self.handle.shutdown.cancelled() => break,
                _ = self.handle.notify.notified() => debug!("Queue worker triggered"),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        info!("Queue worker stopped");
    }

    /// Process entries until the queue is empty or busy.
    pub async fn drain(&self) -> usize {
        let mut processed = 0;
        while !self.handle.is_shutdown() {
            match self.processor.process_next().await {
                Ok(ProcessOutcome::Processed(id)) => {
                    debug!("Queue worker finished generation {}", id);
                    processed += 1;
                }
                Ok(ProcessOutcome::Busy(_)) | Ok(ProcessOutcome::Idle) => break,
                Err(e) => {
                    error!("Queue worker step failed: {}", e);
                    break;
                }
            }
        }
        processed
    }
}
