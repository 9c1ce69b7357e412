//! # Synchronization
//!
//! Everything that talks to a second copy of the content lives here, off the
//! request path:
//!
//! - [`queue`]: outbound FIFO of document snapshots drained by one worker
//!   thread with bounded, fixed-delay retries and an observable status.
//! - [`git`]: the [`queue::Publisher`] that commits snapshots to a git
//!   working tree and pushes them.
//! - [`remote`]: the REST content API (`GET`/`PUT` per collection).
//! - [`poller`]: timer, fetch, diff, callback; cancellable.

pub mod git;
pub mod poller;
pub mod queue;
pub mod remote;

pub use git::GitPublisher;
pub use queue::{PublishOutcome, Publisher, RetryPolicy, SyncEvent, SyncQueue, SyncStatus};
pub use remote::{HttpRemote, RemoteApi};
