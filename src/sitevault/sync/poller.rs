use crate::drift::{diff, Difference};
use crate::error::Result;
use crate::model::Record;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const STOP_CHECK: Duration = Duration::from_millis(50);

/// Handle to a running poll loop. Dropping it cancels the loop.
pub struct PollerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Clears the schedule and waits for the current tick to finish.
    /// An in-flight fetch is allowed to complete.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Blocks until the loop ends, which only happens after a cancel.
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs `local` and `remote` every `interval`, diffs the two snapshots and
/// hands any drift to `on_drift`. Fetch errors are logged and the next tick
/// tries again.
pub fn spawn<L, R, C>(interval: Duration, mut local: L, mut remote: R, mut on_drift: C) -> PollerHandle
where
    L: FnMut() -> Result<Vec<Record>> + Send + 'static,
    R: FnMut() -> Result<Vec<Record>> + Send + 'static,
    C: FnMut(&[Difference]) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    let thread = thread::spawn(move || {
        while !flag.load(Ordering::SeqCst) {
            match local().and_then(|l| remote().map(|r| (l, r))) {
                Ok((l, r)) => {
                    let differences = diff(&l, &r);
                    debug!(count = differences.len(), "poll tick");
                    if !differences.is_empty() {
                        on_drift(&differences);
                    }
                }
                Err(e) => warn!(error = %e, "poll tick failed"),
            }

            let deadline = Instant::now() + interval;
            while !flag.load(Ordering::SeqCst) && Instant::now() < deadline {
                thread::sleep(STOP_CHECK.min(interval));
            }
        }
    });

    PollerHandle {
        stop,
        thread: Some(thread),
    }
}
