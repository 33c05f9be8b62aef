//! Shared state for the tasks of one download session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Semaphore, SemaphorePermit, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::PathCollisionAction;
use crate::error::Error;
use crate::remote::{ContentLister, FileFetcher};
use crate::types::{DownloadRequest, Event, SessionStats};

/// Atomic counters shared across the traversal and file tasks.
#[derive(Default)]
pub(crate) struct SessionCounters {
    directories_listed: AtomicU64,
    files_discovered: AtomicU64,
    files_completed: AtomicU64,
    bytes_written: AtomicU64,
}

impl SessionCounters {
    pub(crate) fn directory_listed(&self) {
        self.directories_listed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_discovered(&self) {
        self.files_discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_completed(&self, bytes: u64) {
        self.files_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            directories_listed: self.directories_listed.load(Ordering::Relaxed),
            files_discovered: self.files_discovered.load(Ordering::Relaxed),
            files_completed: self.files_completed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

/// Everything a traversal or file task needs, shared behind an `Arc`.
///
/// Tasks only ever send errors and read the cancellation token; the terminal
/// decision belongs to the session that owns the receiving end of `error_tx`.
pub(crate) struct SessionContext {
    pub(crate) request: DownloadRequest,
    pub(crate) lister: Arc<dyn ContentLister>,
    pub(crate) fetcher: Arc<dyn FileFetcher>,
    pub(crate) output_dir: PathBuf,
    pub(crate) path_collision: PathCollisionAction,
    /// Cancelled on parent cancellation, on the first error, and once the session returns
    pub(crate) cancel_token: CancellationToken,
    /// Outstanding traversal and file tasks
    pub(crate) tracker: TaskTracker,
    /// Bounds concurrent remote calls
    pub(crate) request_limit: Semaphore,
    pub(crate) error_tx: mpsc::UnboundedSender<Error>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) counters: Arc<SessionCounters>,
    claimed_paths: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

/// Construction parameters for [`SessionContext`]
pub(crate) struct SessionContextParams {
    pub(crate) request: DownloadRequest,
    pub(crate) lister: Arc<dyn ContentLister>,
    pub(crate) fetcher: Arc<dyn FileFetcher>,
    pub(crate) output_dir: PathBuf,
    pub(crate) path_collision: PathCollisionAction,
    pub(crate) max_concurrent_requests: usize,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) error_tx: mpsc::UnboundedSender<Error>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) counters: Arc<SessionCounters>,
}

impl SessionContext {
    pub(crate) fn new(params: SessionContextParams) -> Self {
        let SessionContextParams {
            request,
            lister,
            fetcher,
            output_dir,
            path_collision,
            max_concurrent_requests,
            cancel_token,
            error_tx,
            event_tx,
            counters,
        } = params;

        Self {
            request,
            lister,
            fetcher,
            output_dir,
            path_collision,
            cancel_token,
            tracker: TaskTracker::new(),
            request_limit: Semaphore::new(max_concurrent_requests.max(1)),
            error_tx,
            event_tx,
            counters,
            claimed_paths: Mutex::new(HashMap::new()),
        }
    }

    /// Hand a task-level error to the session. Only the first one decides the outcome.
    pub(crate) fn report(&self, error: Error) {
        tracing::debug!(error = %error, "Task reported error");
        // The receiver is gone once the session has returned; late errors are moot.
        self.error_tx.send(error).ok();
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Wait for a remote-call slot. `None` if the session was cancelled while waiting.
    pub(crate) async fn acquire_request_slot(&self) -> Option<SemaphorePermit<'_>> {
        tokio::select! {
            _ = self.cancel_token.cancelled() => None,
            permit = self.request_limit.acquire() => permit.ok(),
        }
    }

    /// Record `local_path` as written by this session.
    ///
    /// Every file task writing `local_path` shares one write lock, so duplicate
    /// entries overwrite each other whole instead of interleaving.
    pub(crate) fn claim_local_path(&self, local_path: &Path) -> PathClaim {
        let mut claimed = self
            .claimed_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match claimed.get(local_path) {
            Some(write_lock) => PathClaim {
                first: false,
                write_lock: Arc::clone(write_lock),
            },
            None => {
                let write_lock = Arc::new(tokio::sync::Mutex::new(()));
                claimed.insert(local_path.to_path_buf(), Arc::clone(&write_lock));
                PathClaim {
                    first: true,
                    write_lock,
                }
            }
        }
    }
}

/// Outcome of claiming a local path
pub(crate) struct PathClaim {
    /// No earlier task of this session claimed the path
    pub(crate) first: bool,
    /// Held for the whole write of the file
    pub(crate) write_lock: Arc<tokio::sync::Mutex<()>>,
}
