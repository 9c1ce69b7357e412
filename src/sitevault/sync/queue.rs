use crate::error::{Result, SiteError};
use crate::model::Document;
use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A document snapshot waiting to be published.
#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub id: Uuid,
    pub document: Document,
    pub message: String,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The target already held this snapshot.
    Unchanged,
}

/// Destination for snapshots. Must be safe to call again with the same event.
pub trait Publisher: Send {
    fn publish(&mut self, event: &SyncEvent) -> Result<PublishOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEvent {
    pub id: Uuid,
    pub message: String,
    pub attempts: u32,
    pub error: String,
}

/// Observable state of the sync worker.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    pub pending: usize,
    pub published: usize,
    pub unchanged: usize,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub failed: Vec<FailedEvent>,
}

impl SyncStatus {
    pub fn is_idle(&self) -> bool {
        self.pending == 0
    }
}

fn lock(status: &Mutex<SyncStatus>) -> MutexGuard<'_, SyncStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// FIFO of snapshots drained by one background worker.
///
/// Events are published in order. Each gets up to `max_attempts` tries with a
/// fixed delay between them; events that exhaust their attempts are recorded
/// in [`SyncStatus::failed`] and the worker moves on.
pub struct SyncQueue {
    sender: Option<Sender<SyncEvent>>,
    status: Arc<Mutex<SyncStatus>>,
    worker: Option<JoinHandle<()>>,
}

impl SyncQueue {
    pub fn start<P: Publisher + 'static>(publisher: P, policy: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::channel();
        let status = Arc::new(Mutex::new(SyncStatus::default()));
        let worker_status = Arc::clone(&status);
        let worker = thread::Builder::new()
            .name("sitevault-sync".to_string())
            .spawn(move || drain(receiver, publisher, policy, worker_status))
            .map_err(|e| error!(error = %e, "could not spawn sync worker"))
            .ok();

        Self {
            sender: worker.as_ref().map(|_| sender),
            status,
            worker,
        }
    }

    pub fn enqueue(&self, document: Document, message: impl Into<String>) -> Result<Uuid> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| SiteError::Sync("sync worker is not running".to_string()))?;
        let event = SyncEvent {
            id: Uuid::new_v4(),
            document,
            message: message.into(),
            enqueued_at: Utc::now(),
        };
        let id = event.id;

        lock(&self.status).pending += 1;
        if sender.send(event).is_err() {
            lock(&self.status).pending -= 1;
            return Err(SiteError::Sync("sync worker has stopped".to_string()));
        }
        debug!(%id, "sync event queued");
        Ok(id)
    }

    pub fn status(&self) -> SyncStatus {
        lock(&self.status).clone()
    }

    /// Stops accepting events, waits for the queue to drain and returns the final status.
    pub fn shutdown(mut self) -> SyncStatus {
        self.stop();
        self.status()
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("sync worker panicked");
            }
        }
    }
}

impl Drop for SyncQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drain<P: Publisher>(
    receiver: Receiver<SyncEvent>,
    mut publisher: P,
    policy: RetryPolicy,
    status: Arc<Mutex<SyncStatus>>,
) {
    let max_attempts = policy.max_attempts.max(1);
    for event in receiver {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match publisher.publish(&event) {
                Ok(outcome) => {
                    let mut s = lock(&status);
                    match outcome {
                        PublishOutcome::Published => s.published += 1,
                        PublishOutcome::Unchanged => s.unchanged += 1,
                    }
                    s.last_success = Some(Utc::now());
                    info!(id = %event.id, ?outcome, attempt, "sync event done");
                    break;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(id = %event.id, attempt, error = %e, "sync attempt failed, retrying");
                    lock(&status).last_error = Some(e.to_string());
                    thread::sleep(policy.delay);
                }
                Err(e) => {
                    error!(id = %event.id, attempt, error = %e, "sync event abandoned");
                    let mut s = lock(&status);
                    s.last_error = Some(e.to_string());
                    s.failed.push(FailedEvent {
                        id: event.id,
                        message: event.message.clone(),
                        attempts: attempt,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }
        lock(&status).pending -= 1;
    }
    debug!("sync worker exiting");
}
