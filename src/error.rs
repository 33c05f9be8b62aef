//! Error types for partial-git
//!
//! This module provides error handling for the library, including:
//! - The session-level [`Error`] returned by a download, one variant per terminal outcome
//! - [`RemoteError`] surfaced by the remote capabilities (listing and fetching)
//! - [`ErrorKind`] classification so callers can map outcomes to distinct messages

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for partial-git operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for partial-git
///
/// Task-level failures carry the remote path that caused them. `DeadlineExceeded`
/// and `Cancelled` are session outcomes and never originate from a single task.
#[derive(Debug, Error)]
pub enum Error {
    /// Listing a remote directory failed or returned an unexpected shape
    #[error("failed to get contents for path '{path}': {source}")]
    Listing {
        /// Remote path whose listing failed
        path: String,
        /// Underlying remote failure
        #[source]
        source: RemoteError,
    },

    /// Fetching a file's bytes failed (transport error or non-success status)
    #[error("failed to download {path}: {source}")]
    Transfer {
        /// Remote path of the file being downloaded
        path: String,
        /// Underlying remote failure
        #[source]
        source: RemoteError,
    },

    /// Creating a directory or writing a file on the local filesystem failed
    #[error("failed to write {local_path} (from {path}): {source}")]
    LocalIo {
        /// Remote path of the file being materialized
        path: String,
        /// Local path that could not be created or written
        local_path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Two remote entries resolved to the same local file
    #[error("{path} and an earlier entry both map to {local_path}")]
    PathCollision {
        /// Remote path of the second claimant
        path: String,
        /// Local path claimed twice
        local_path: PathBuf,
    },

    /// The session deadline elapsed with tasks still outstanding
    #[error("download took too long (deadline of {}s exceeded)", .0.as_secs_f64())]
    DeadlineExceeded(Duration),

    /// The caller cancelled the session
    #[error("download cancelled")]
    Cancelled,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "deadline")
        key: Option<String>,
    },

    /// The download request could not be parsed or is malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// `download` was called on a session that already ran
    #[error("download session already started")]
    AlreadyStarted,

    /// Remote call outside of a download session (rate limit, user lookup)
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Building the HTTP client failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Failures surfaced by [`ContentLister`](crate::remote::ContentLister) and
/// [`FileFetcher`](crate::remote::FileFetcher) implementations
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The path (or the repository) does not exist or is not visible with current credentials
    #[error("not found: {0}")]
    NotFound(String),

    /// The API rate limit is exhausted
    #[error("rate limit exceeded{}", reset_suffix(.reset))]
    RateLimited {
        /// When the limit resets, if the server said so
        reset: Option<DateTime<Utc>>,
    },

    /// The server refused the request for a reason other than rate limiting
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Any other non-success HTTP status
    #[error("received HTTP {status}")]
    Status {
        /// The HTTP status code
        status: u16,
    },

    /// The response did not have the expected shape
    #[error("unexpected response: {0}")]
    UnexpectedShape(String),

    /// Transport failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The byte stream failed mid-transfer
    #[error("stream error: {0}")]
    Stream(String),
}

fn reset_suffix(reset: &Option<DateTime<Utc>>) -> String {
    match reset {
        Some(at) => format!(" (resets at {})", at.to_rfc3339()),
        None => String::new(),
    }
}

/// Classification of a download outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote listing failed
    Listing,
    /// Remote transfer failed
    Transfer,
    /// Local filesystem failure (including path collisions)
    LocalIo,
    /// Deadline elapsed
    DeadlineExceeded,
    /// Caller cancelled
    Cancelled,
    /// Anything raised before or outside a session (config, request, remote lookups)
    Other,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Listing { .. } => ErrorKind::Listing,
            Error::Transfer { .. } => ErrorKind::Transfer,
            Error::LocalIo { .. } | Error::PathCollision { .. } => ErrorKind::LocalIo,
            Error::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config { .. }
            | Error::InvalidRequest(_)
            | Error::AlreadyStarted
            | Error::Remote(_)
            | Error::Network(_) => ErrorKind::Other,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Listing { source, .. } => match source {
                RemoteError::NotFound(_) => "not_found",
                RemoteError::RateLimited { .. } => "rate_limited",
                RemoteError::Forbidden(_) => "forbidden",
                _ => "listing_error",
            },
            Error::Transfer { .. } => "transfer_error",
            Error::LocalIo { .. } => "local_io_error",
            Error::PathCollision { .. } => "path_collision",
            Error::DeadlineExceeded(_) => "deadline_exceeded",
            Error::Cancelled => "cancelled",
            Error::Config { .. } => "config_error",
            Error::InvalidRequest(_) => "invalid_request",
            Error::AlreadyStarted => "already_started",
            Error::Remote(_) => "remote_error",
            Error::Network(_) => "network_error",
        }
    }

    /// The remote path a task-level error refers to
    pub fn remote_path(&self) -> Option<&str> {
        match self {
            Error::Listing { path, .. }
            | Error::Transfer { path, .. }
            | Error::LocalIo { path, .. }
            | Error::PathCollision { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Whether the error was produced by a traversal or file task
    pub fn is_task_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Listing | ErrorKind::Transfer | ErrorKind::LocalIo
        )
    }
}

impl RemoteError {
    /// Whether the remote reported the path as missing or invisible
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    /// Whether the request was refused for quota or permission reasons
    pub fn is_rate_limited_or_forbidden(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited { .. } | RemoteError::Forbidden(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn io_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")
    }

    #[test]
    fn kinds_cover_every_task_variant() {
        let listing = Error::Listing {
            path: "src".into(),
            source: RemoteError::Status { status: 500 },
        };
        let transfer = Error::Transfer {
            path: "src/a.rs".into(),
            source: RemoteError::Stream("reset".into()),
        };
        let local = Error::LocalIo {
            path: "src/a.rs".into(),
            local_path: PathBuf::from("repo/a.rs"),
            source: io_error(),
        };
        let collision = Error::PathCollision {
            path: "src/a.rs".into(),
            local_path: PathBuf::from("repo/a.rs"),
        };

        assert_eq!(listing.kind(), ErrorKind::Listing);
        assert_eq!(transfer.kind(), ErrorKind::Transfer);
        assert_eq!(local.kind(), ErrorKind::LocalIo);
        assert_eq!(collision.kind(), ErrorKind::LocalIo);
        for err in [&listing, &transfer, &local, &collision] {
            assert!(err.is_task_error(), "{err} should be a task error");
        }
    }

    #[test]
    fn session_outcomes_are_not_task_errors() {
        let deadline = Error::DeadlineExceeded(Duration::from_secs(60));
        assert_eq!(deadline.kind(), ErrorKind::DeadlineExceeded);
        assert!(!deadline.is_task_error());
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
        assert!(!Error::Cancelled.is_task_error());
        assert_eq!(Error::AlreadyStarted.kind(), ErrorKind::Other);
    }

    #[test]
    fn messages_include_remote_path() {
        let err = Error::Transfer {
            path: "docs/guide.md".into(),
            source: RemoteError::Status { status: 502 },
        };
        assert_eq!(
            err.to_string(),
            "failed to download docs/guide.md: received HTTP 502"
        );
        assert_eq!(err.remote_path(), Some("docs/guide.md"));

        let err = Error::Listing {
            path: "docs".into(),
            source: RemoteError::NotFound("docs".into()),
        };
        assert_eq!(
            err.to_string(),
            "failed to get contents for path 'docs': not found: docs"
        );
    }

    #[test]
    fn deadline_message_reports_seconds() {
        let err = Error::DeadlineExceeded(Duration::from_millis(1500));
        assert_eq!(
            err.to_string(),
            "download took too long (deadline of 1.5s exceeded)"
        );
    }

    #[test]
    fn listing_error_codes_distinguish_access_problems() {
        let code = |source| Error::Listing {
            path: String::new(),
            source,
        };
        assert_eq!(
            code(RemoteError::NotFound("x".into())).error_code(),
            "not_found"
        );
        assert_eq!(
            code(RemoteError::RateLimited { reset: None }).error_code(),
            "rate_limited"
        );
        assert_eq!(
            code(RemoteError::Forbidden("sso".into())).error_code(),
            "forbidden"
        );
        assert_eq!(
            code(RemoteError::UnexpectedShape("null".into())).error_code(),
            "listing_error"
        );
    }

    #[test]
    fn rate_limit_message_includes_reset_time() {
        let reset = Utc.timestamp_opt(1_700_000_000, 0).single();
        let err = RemoteError::RateLimited { reset };
        assert_eq!(
            err.to_string(),
            "rate limit exceeded (resets at 2023-11-14T22:13:20+00:00)"
        );
        assert!(err.is_rate_limited_or_forbidden());
        assert!(!err.is_not_found());
        assert_eq!(
            RemoteError::RateLimited { reset: None }.to_string(),
            "rate limit exceeded"
        );
    }
}
