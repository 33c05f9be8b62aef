//! Configuration types for partial-git

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for a [`Downloader`](crate::Downloader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Local root the `<repo>/...` tree is written under (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Global deadline for one download session (default: 60 seconds)
    ///
    /// Measured from the moment `download` is called. When it elapses the session
    /// returns [`Error::DeadlineExceeded`] regardless of in-flight work.
    #[serde(default = "default_deadline", with = "duration_serde")]
    pub deadline: Duration,

    /// Maximum number of remote calls (listings and file transfers) in flight at once (default: 10)
    ///
    /// Traversal still fans out one task per entry; this only bounds how many of them
    /// talk to the remote concurrently.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// What to do when two remote entries map to the same local file
    #[serde(default)]
    pub path_collision: PathCollisionAction,

    /// GitHub API settings
    #[serde(default)]
    pub github: GitHubConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            deadline: default_deadline(),
            max_concurrent_requests: default_max_concurrent_requests(),
            path_collision: PathCollisionAction::default(),
            github: GitHubConfig::default(),
        }
    }
}

impl Config {
    /// Check the configuration for values that would make every download fail
    pub fn validate(&self) -> Result<()> {
        if self.deadline.is_zero() {
            return Err(Error::Config {
                message: "deadline must be greater than zero".to_string(),
                key: Some("deadline".to_string()),
            });
        }

        if self.deadline > MAX_DEADLINE {
            return Err(Error::Config {
                message: format!(
                    "deadline must be at most {} seconds",
                    MAX_DEADLINE.as_secs()
                ),
                key: Some("deadline".to_string()),
            });
        }

        if self.max_concurrent_requests == 0 {
            return Err(Error::Config {
                message: "max_concurrent_requests must be at least 1".to_string(),
                key: Some("max_concurrent_requests".to_string()),
            });
        }

        if let Err(e) = url::Url::parse(&self.github.api_base_url) {
            return Err(Error::Config {
                message: format!(
                    "api_base_url '{}' is not a valid URL: {}",
                    self.github.api_base_url, e
                ),
                key: Some("github.api_base_url".to_string()),
            });
        }

        if matches!(&self.github.token, Some(token) if token.trim().is_empty()) {
            return Err(Error::Config {
                message: "token cannot be empty".to_string(),
                key: Some("github.token".to_string()),
            });
        }

        Ok(())
    }
}

/// GitHub API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API root (default: "https://api.github.com")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// User-Agent header sent with every request (GitHub rejects requests without one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Personal access token (None = anonymous, 60 requests/hour)
    ///
    /// Never serialized back out.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            token: None,
        }
    }
}

impl GitHubConfig {
    /// Same settings, authenticated with `token`
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

// The token is redacted so configs can be logged.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base_url", &self.api_base_url)
            .field("user_agent", &self.user_agent)
            .field("request_timeout", &self.request_timeout)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Local path collision handling within one session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathCollisionAction {
    /// Later writes replace earlier ones (last write wins)
    #[default]
    Overwrite,
    /// The second entry mapping to an already-claimed path fails the session
    Fail,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Longest accepted session deadline (one day)
pub const MAX_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

fn default_deadline() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    concat!("partial-git/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
