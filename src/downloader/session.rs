//! Download session: one traversal under one deadline with one terminal outcome.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::EVENT_CHANNEL_CAPACITY;
use super::context::{SessionContext, SessionContextParams, SessionCounters};
use super::traversal::walk;
use crate::config::{Config, PathCollisionAction};
use crate::error::{Error, Result};
use crate::remote::{ContentLister, FileFetcher};
use crate::types::{DownloadRequest, Event, SessionState, SessionStats};

/// A single download of one repository subtree
///
/// State machine: `Idle -> Running -> {Completed, Failed, TimedOut, Cancelled}`.
/// [`download`](Self::download) may be called once; the session decides exactly one
/// terminal outcome:
///
/// - `Completed`: every traversal and file task finished without error
/// - `Failed`: the first task-level error ([`Error::Listing`], [`Error::Transfer`],
///   [`Error::LocalIo`], [`Error::PathCollision`])
/// - `TimedOut`: the deadline elapsed first ([`Error::DeadlineExceeded`])
/// - `Cancelled`: the caller's token fired first ([`Error::Cancelled`])
///
/// `download` returns as soon as the outcome is known. Tasks still in flight are
/// not awaited; they observe cancellation at their next check and stop.
pub struct DownloadSession {
    request: DownloadRequest,
    lister: Arc<dyn ContentLister>,
    fetcher: Arc<dyn FileFetcher>,
    output_dir: PathBuf,
    deadline: Duration,
    max_concurrent_requests: usize,
    path_collision: PathCollisionAction,
    event_tx: broadcast::Sender<Event>,
    state: Mutex<SessionState>,
    counters: Arc<SessionCounters>,
}

impl DownloadSession {
    /// Create a session with its own event channel
    pub fn new(
        request: DownloadRequest,
        lister: Arc<dyn ContentLister>,
        fetcher: Arc<dyn FileFetcher>,
        config: &Config,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_events(request, lister, fetcher, config, event_tx)
    }

    pub(crate) fn with_events(
        request: DownloadRequest,
        lister: Arc<dyn ContentLister>,
        fetcher: Arc<dyn FileFetcher>,
        config: &Config,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            request,
            lister,
            fetcher,
            output_dir: config.output_dir.clone(),
            deadline: config.deadline,
            max_concurrent_requests: config.max_concurrent_requests,
            path_collision: config.path_collision,
            event_tx,
            state: Mutex::new(SessionState::Idle),
            counters: Arc::new(SessionCounters::default()),
        }
    }

    /// The request this session downloads
    pub fn request(&self) -> &DownloadRequest {
        &self.request
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Counters so far (safe to call while `download` runs)
    pub fn stats(&self) -> SessionStats {
        self.counters.snapshot()
    }

    /// Subscribe to this session's events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run the download
    ///
    /// Cancelling `cancel` aborts in-flight remote calls and makes this return
    /// [`Error::Cancelled`]. The deadline is measured from this call.
    ///
    /// # Errors
    ///
    /// Returns the terminal error described on [`DownloadSession`], or
    /// [`Error::AlreadyStarted`] if called a second time.
    pub async fn download(&self, cancel: CancellationToken) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != SessionState::Idle {
                return Err(Error::AlreadyStarted);
            }
            *state = SessionState::Running;
        }

        // Too far out to represent means no deadline at all.
        let deadline_at = Instant::now().checked_add(self.deadline);
        let scope = cancel.child_token();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();

        let ctx = Arc::new(SessionContext::new(SessionContextParams {
            request: self.request.clone(),
            lister: Arc::clone(&self.lister),
            fetcher: Arc::clone(&self.fetcher),
            output_dir: self.output_dir.clone(),
            path_collision: self.path_collision,
            max_concurrent_requests: self.max_concurrent_requests,
            cancel_token: scope.clone(),
            error_tx,
            event_tx: self.event_tx.clone(),
            counters: Arc::clone(&self.counters),
        }));

        tracing::info!(
            repo = %self.request.repo,
            base_path = %self.request.base_path,
            output_dir = %self.output_dir.display(),
            deadline_secs = self.deadline.as_secs_f64(),
            "Starting download"
        );
        ctx.emit(Event::DownloadStarted {
            repo: self.request.repo.clone(),
            base_path: self.request.base_path.clone(),
        });

        ctx.tracker
            .spawn(walk(Arc::clone(&ctx), self.request.base_path.clone()));
        // Children are spawned from tracked tasks, so the count cannot reach zero early.
        ctx.tracker.close();

        let outcome = tokio::select! {
            biased;
            Some(error) = error_rx.recv() => Err(error),
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = deadline_elapsed(deadline_at) => Err(Error::DeadlineExceeded(self.deadline)),
            _ = ctx.tracker.wait() => match error_rx.try_recv() {
                // A task may report and exit between polls of the branches above.
                Ok(error) => Err(error),
                Err(_) => Ok(()),
            },
        };

        // Stop stragglers from starting new work; they are not awaited.
        scope.cancel();
        while let Ok(extra) = error_rx.try_recv() {
            tracing::warn!(error = %extra, "Dropping error reported after the outcome was decided");
        }

        let state = match &outcome {
            Ok(()) => SessionState::Completed,
            Err(Error::Cancelled) => SessionState::Cancelled,
            Err(Error::DeadlineExceeded(_)) => SessionState::TimedOut,
            Err(_) => SessionState::Failed,
        };
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;

        let stats = self.counters.snapshot();
        match &outcome {
            Ok(()) => tracing::info!(
                repo = %self.request.repo,
                files = stats.files_completed,
                bytes = stats.bytes_written,
                "Download complete"
            ),
            Err(e) => tracing::error!(
                repo = %self.request.repo,
                state = ?state,
                files = stats.files_completed,
                error = %e,
                "Download failed"
            ),
        }
        ctx.emit(Event::DownloadFinished {
            state,
            stats,
            error: outcome.as_ref().err().map(ToString::to_string),
        });

        outcome
    }
}

async fn deadline_elapsed(deadline_at: Option<Instant>) {
    match deadline_at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
