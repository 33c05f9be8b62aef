//! # partial-git
//!
//! Download a single directory (or file) of a GitHub repository without cloning it.
//!
//! ## Design Philosophy
//!
//! partial-git is designed to be:
//! - **Concurrent** - Every directory and file is handled by its own task, with a
//!   configurable bound on simultaneous remote calls
//! - **Fail-fast** - The first listing, transfer or filesystem error ends the download
//! - **Bounded** - Each download runs under a deadline and honours a cancellation token
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use partial_git::{Config, DownloadRequest, Downloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         output_dir: "downloads".into(),
//!         ..Default::default()
//!     };
//!     let downloader = Downloader::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = DownloadRequest::parse("https://github.com/rust-lang/rust/tree/master/src/etc")?;
//!     downloader.download(request).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Files land at `<output_dir>/<repo>/<path below the requested directory>`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download engine: sessions, traversal and file transfer
pub mod downloader;
/// Error types
pub mod error;
/// Remote repository access
pub mod remote;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, GitHubConfig, PathCollisionAction};
pub use downloader::{DownloadSession, Downloader};
pub use error::{Error, ErrorKind, RemoteError, Result};
pub use remote::{ByteStream, ContentLister, FileFetcher, GitHubClient, RateLimitStatus};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    DownloadRef, DownloadRequest, EntryKind, Event, Listing, RemoteEntry, RepoRef,
    SessionState, SessionStats,
};

/// Cancel `token` when the process receives a termination signal.
///
/// Pass the same token to [`Downloader::download_with_cancel`] to make Ctrl+C end a
/// download with [`Error::Cancelled`] instead of killing the process mid-write.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The returned handle can be aborted once the download is over.
///
/// # Example
///
/// ```no_run
/// use partial_git::{CancellationToken, Config, DownloadRequest, Downloader, cancel_on_shutdown_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = Downloader::new(Config::default())?;
///     let token = CancellationToken::new();
///     let watcher = cancel_on_shutdown_signal(token.clone());
///
///     let request = DownloadRequest::parse("owner/repo/tree/main/docs")?;
///     let result = downloader.download_with_cancel(request, token).await;
///     watcher.abort();
///
///     result?;
///     Ok(())
/// }
/// ```
pub fn cancel_on_shutdown_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = wait_for_signal() => {
                tracing::info!("Cancelling download");
                token.cancel();
            }
        }
    })
}

/// Resolve on SIGTERM or SIGINT; never resolve if no handler can be installed
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut terminate), Ok(mut interrupt)) => {
            let name = tokio::select! {
                _ = terminate.recv() => "SIGTERM",
                _ = interrupt.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "Received shutdown signal");
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            tracing::warn!(error = %e, "Listening for one of SIGTERM/SIGINT only");
            only.recv().await;
            tracing::info!("Received shutdown signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            wait_for_ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => {
            // Failing to listen is not a request to cancel
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
