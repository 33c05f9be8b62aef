//! Concurrent recursive fetch-and-materialize engine.
//!
//! Organized by concern:
//! - `session` - Session lifecycle, deadline and terminal outcome
//! - `traversal` - Recursive listing and fan-out
//! - `file_task` - Per-file transfer to disk
//! - `context` - State shared by the tasks of one session

mod context;
mod file_task;
mod session;
mod traversal;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use session::DownloadSession;

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::remote::{ContentLister, FileFetcher, GitHubClient};
use crate::types::{DownloadRequest, Event};

/// Buffer size of the event broadcast channel
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Entry point for downloading repository subtrees (cloneable - all fields are Arc-wrapped)
///
/// Every call to [`download`](Self::download) runs an independent
/// [`DownloadSession`]; events from all sessions go to the same channel.
#[derive(Clone)]
pub struct Downloader {
    config: Arc<Config>,
    lister: Arc<dyn ContentLister>,
    fetcher: Arc<dyn FileFetcher>,
    event_tx: broadcast::Sender<Event>,
}

impl Downloader {
    /// Create a downloader backed by the GitHub API
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(GitHubClient::new(&config.github)?);
        Ok(Self::build(config, client.clone(), client))
    }

    /// Create a downloader with custom remote capabilities
    pub fn with_remote(
        config: Config,
        lister: Arc<dyn ContentLister>,
        fetcher: Arc<dyn FileFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, lister, fetcher))
    }

    fn build(
        config: Config,
        lister: Arc<dyn ContentLister>,
        fetcher: Arc<dyn FileFetcher>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            lister,
            fetcher,
            event_tx,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to events from every session started by this downloader
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Prepare a session without starting it
    pub fn session(&self, request: DownloadRequest) -> DownloadSession {
        DownloadSession::with_events(
            request,
            Arc::clone(&self.lister),
            Arc::clone(&self.fetcher),
            &self.config,
            self.event_tx.clone(),
        )
    }

    /// Download `request` under the configured deadline
    pub async fn download(&self, request: DownloadRequest) -> Result<()> {
        self.download_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Download `request`, aborting with [`Error::Cancelled`](crate::Error::Cancelled)
    /// when `cancel` fires
    pub async fn download_with_cancel(
        &self,
        request: DownloadRequest,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.session(request).download(cancel).await
    }
}
