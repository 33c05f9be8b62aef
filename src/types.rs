//! Core types for partial-git

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Repository coordinates passed to every remote listing
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Account or organization owning the repository
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Branch, tag or commit (None = the repository's default branch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)?;
        if let Some(git_ref) = &self.git_ref {
            write!(f, "@{}", git_ref)?;
        }
        Ok(())
    }
}

/// What to download: a repository plus the remote subtree root
///
/// Immutable for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Repository coordinates
    pub repo: RepoRef,
    /// Remote path being fetched ("" = whole repository)
    #[serde(default)]
    pub base_path: String,
}

impl DownloadRequest {
    /// Build a request from already-validated parts
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        git_ref: Option<String>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            repo: RepoRef {
                owner: owner.into(),
                repo: repo.into(),
                git_ref,
            },
            base_path: base_path.into().trim_matches('/').to_string(),
        }
    }

    /// Parse a GitHub location into a request
    ///
    /// Accepted forms:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo/tree/<ref>/path/to/dir`
    /// - `https://github.com/owner/repo/blob/<ref>/path/to/file`
    /// - `https://github.com/owner/repo/path/to/dir` (default branch)
    /// - any of the above without scheme and host, e.g. `owner/repo/tree/main/src`
    ///
    /// # Examples
    ///
    /// ```
    /// use partial_git::DownloadRequest;
    ///
    /// let request = DownloadRequest::parse("owner/repo/tree/main/src").unwrap();
    /// assert_eq!(request.repo.owner, "owner");
    /// assert_eq!(request.repo.git_ref.as_deref(), Some("main"));
    /// assert_eq!(request.base_path, "src");
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidRequest("URL cannot be empty".to_string()));
        }

        let path = if input.contains("://") {
            let parsed = url::Url::parse(input)
                .map_err(|e| Error::InvalidRequest(format!("invalid URL format: {}", e)))?;
            if parsed.scheme() != "https" && parsed.scheme() != "http" {
                return Err(Error::InvalidRequest(
                    "URL scheme must be http or https".to_string(),
                ));
            }
            match parsed.host_str() {
                Some("github.com") | Some("www.github.com") => {}
                _ => {
                    return Err(Error::InvalidRequest(
                        "URL must be from github.com".to_string(),
                    ));
                }
            }
            parsed.path().to_string()
        } else {
            let stripped = input
                .strip_prefix("www.github.com/")
                .or_else(|| input.strip_prefix("github.com/"))
                .unwrap_or(input);
            stripped.to_string()
        };

        let parts = path
            .split('/')
            .filter(|p| !p.is_empty())
            .map(|p| {
                urlencoding::decode(p)
                    .map(|s| s.into_owned())
                    .map_err(|e| Error::InvalidRequest(format!("invalid path encoding: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        if parts.len() < 2 {
            return Err(Error::InvalidRequest(
                "GitHub URL must include owner and repository (e.g., https://github.com/owner/repo)"
                    .to_string(),
            ));
        }

        if !is_valid_owner(&parts[0]) {
            return Err(Error::InvalidRequest(format!(
                "invalid GitHub owner name: {}",
                parts[0]
            )));
        }
        if !is_valid_repo(&parts[1]) {
            return Err(Error::InvalidRequest(format!(
                "invalid GitHub repository name: {}",
                parts[1]
            )));
        }

        let (git_ref, base_path) = match parts.get(2).map(String::as_str) {
            Some("tree") | Some("blob") => match parts.get(3) {
                Some(git_ref) => (Some(git_ref.clone()), parts[4..].join("/")),
                None => {
                    return Err(Error::InvalidRequest(format!(
                        "missing branch or tag after '{}'",
                        parts[2]
                    )));
                }
            },
            Some(_) => (None, parts[2..].join("/")),
            None => (None, String::new()),
        };

        Ok(Self::new(
            parts[0].clone(),
            parts[1].clone(),
            git_ref,
            base_path,
        ))
    }
}

impl std::str::FromStr for DownloadRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// Alphanumeric with inner '-' or '_'.
fn is_valid_owner(name: &str) -> bool {
    is_valid_name(name, &['-', '_'])
}

// Repository names may also contain '.', e.g. "socket.io".
fn is_valid_repo(name: &str) -> bool {
    is_valid_name(name, &['-', '_', '.'])
}

fn is_valid_name(name: &str, inner: &[char]) -> bool {
    let first_last_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    first_last_ok(name.chars().next())
        && first_last_ok(name.chars().last())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || inner.contains(&c))
}

/// Node kind in a remote listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    #[serde(rename = "dir")]
    Directory,
}

/// Opaque handle a [`FileFetcher`](crate::remote::FileFetcher) uses to fetch a file
///
/// For GitHub this is the raw download URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadRef(pub String);

impl DownloadRef {
    /// Borrow the handle
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DownloadRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One element of a remote directory listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// File or directory
    pub kind: EntryKind,
    /// Full path from the repository root (e.g. "src/util/x.go")
    pub remote_path: String,
    /// Fetch handle (files only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_ref: Option<DownloadRef>,
}

impl RemoteEntry {
    /// A file entry
    pub fn file(remote_path: impl Into<String>, download_ref: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::File,
            remote_path: remote_path.into(),
            download_ref: Some(DownloadRef(download_ref.into())),
        }
    }

    /// A directory entry
    pub fn directory(remote_path: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Directory,
            remote_path: remote_path.into(),
            download_ref: None,
        }
    }

    /// Final path component
    pub fn name(&self) -> &str {
        self.remote_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.remote_path)
    }
}

/// Result of listing one remote path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listing {
    /// The path is itself a file
    File(RemoteEntry),
    /// The path is a directory; entries in the order the remote returned them
    Directory(Vec<RemoteEntry>),
}

/// Download session state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, `download` not called yet
    Idle,
    /// Tasks are running
    Running,
    /// Every task finished without error
    Completed,
    /// A task reported an error
    Failed,
    /// The deadline elapsed with tasks outstanding
    TimedOut,
    /// The caller cancelled
    Cancelled,
}

impl SessionState {
    /// Whether the session has reached an end state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Running)
    }
}

/// Point-in-time counters for a session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Directory listings that resolved
    pub directories_listed: u64,
    /// Files discovered so far
    pub files_discovered: u64,
    /// Files fully written to disk
    pub files_completed: u64,
    /// Bytes written to disk across all files
    pub bytes_written: u64,
}

/// Event emitted during a download
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Session started
    DownloadStarted {
        /// Repository being downloaded
        repo: RepoRef,
        /// Remote subtree root
        base_path: String,
    },

    /// A directory listing resolved
    DirectoryListed {
        /// Remote directory path
        remote_path: String,
        /// Number of entries returned
        entries: usize,
    },

    /// A file transfer began
    FileStarted {
        /// Remote file path
        remote_path: String,
    },

    /// A file was fully written
    FileCompleted {
        /// Remote file path
        remote_path: String,
        /// Where it was written
        local_path: PathBuf,
        /// Size in bytes
        bytes: u64,
    },

    /// Session reached a terminal state
    DownloadFinished {
        /// Terminal state
        state: SessionState,
        /// Counters at the moment the state was decided
        stats: SessionStats,
        /// Error message for non-completed sessions
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}
