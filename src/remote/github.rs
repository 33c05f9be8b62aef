//! GitHub REST API implementation of the remote capabilities

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use futures::stream;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use super::traits::{ByteStream, ContentLister, FileFetcher};
use crate::config::GitHubConfig;
use crate::error::{Error, RemoteError, Result};
use crate::types::{Listing, RemoteEntry, RepoRef};

const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// GitHub client implementing [`ContentLister`] and [`FileFetcher`]
///
/// The token (if any) is taken from [`GitHubConfig`] at construction and only sent
/// to the API host, never to raw download URLs.
///
/// # Examples
///
/// ```no_run
/// use partial_git::config::GitHubConfig;
/// use partial_git::remote::{ContentLister, GitHubClient};
/// use partial_git::DownloadRequest;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GitHubClient::new(&GitHubConfig::default())?;
/// let request = DownloadRequest::parse("https://github.com/rust-lang/rust/tree/master/src")?;
/// let listing = client.list(&request.repo, &request.base_path).await?;
/// println!("{:?}", listing);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: Url,
    token: Option<String>,
}

/// Core API quota as reported by `GET /rate_limit`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Requests used in the current window
    pub used: u32,
    /// When the window resets
    #[serde(with = "chrono::serde::ts_seconds")]
    pub reset: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: RateLimitStatus,
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

/// `GET /repos/{owner}/{repo}/contents/{path}` returns an object for a file and an
/// array for a directory.
#[derive(Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Directory(Vec<ContentItem>),
    Single(ContentItem),
}

#[derive(Deserialize)]
struct ContentItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

impl ContentItem {
    /// Convert to an entry; `None` for node kinds the engine does not materialize
    fn into_entry(self) -> Option<std::result::Result<RemoteEntry, RemoteError>> {
        match self.kind.as_str() {
            "file" => Some(match self.download_url {
                Some(url) => Ok(RemoteEntry::file(self.path, url)),
                None => Err(RemoteError::UnexpectedShape(format!(
                    "file '{}' has no download URL",
                    self.path
                ))),
            }),
            "dir" => Some(Ok(RemoteEntry::directory(self.path))),
            other => {
                tracing::warn!(
                    remote_path = %self.path,
                    kind = other,
                    "Skipping entry that is neither a file nor a directory"
                );
                None
            }
        }
    }
}

impl GitHubClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unusable API URL and [`Error::Network`] if the
    /// HTTP client cannot be built.
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base_url).map_err(|e| Error::Config {
            message: format!("invalid api_base_url '{}': {}", config.api_base_url, e),
            key: Some("github.api_base_url".to_string()),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("api_base_url '{}' cannot be a base", config.api_base_url),
                key: Some("github.api_base_url".to_string()),
            });
        }

        let mut headers = HeaderMap::new();
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_base,
            token: config.token.clone(),
        })
    }

    /// Whether requests are authenticated
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Current core API quota
    pub async fn rate_limit(&self) -> Result<RateLimitStatus> {
        let url = self.endpoint(["rate_limit"]);
        let response = self.get_api(url, "rate_limit").await?;
        let body: RateLimitResponse = read_json(response).await?;
        Ok(body.rate)
    }

    /// Login of the user the token belongs to
    pub async fn authenticated_user(&self) -> Result<String> {
        let url = self.endpoint(["user"]);
        let response = self.get_api(url, "user").await?;
        let body: UserResponse = read_json(response).await?;
        Ok(body.login)
    }

    /// Build an API URL, percent-encoding each segment
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_base.clone();
        // Checked in `new`: the base URL can have path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> Url {
        let segments = ["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(segments);
        if let Some(git_ref) = &repo.git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }
        url
    }

    async fn get_api(
        &self,
        url: Url,
        what: &str,
    ) -> std::result::Result<Response, RemoteError> {
        tracing::debug!(url = %url, "GitHub API request");
        let mut request = self.http.get(url).header(ACCEPT, GITHUB_JSON);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        check_status(response, what).await
    }
}

/// Map non-success responses onto the remote error taxonomy
async fn check_status(response: Response, what: &str) -> std::result::Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(what.to_string()));
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let headers = response.headers();
        let exhausted = headers
            .get(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");
        if exhausted || status == StatusCode::TOO_MANY_REQUESTS {
            let reset = headers
                .get(RATE_LIMIT_RESET_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
            return Err(RemoteError::RateLimited { reset });
        }

        let message = response
            .json::<ApiMessage>()
            .await
            .map(|m| m.message)
            .unwrap_or_else(|_| what.to_string());
        return Err(RemoteError::Forbidden(message));
    }

    Err(RemoteError::Status {
        status: status.as_u16(),
    })
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, RemoteError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| RemoteError::UnexpectedShape(e.to_string()))
}

#[async_trait]
impl ContentLister for GitHubClient {
    async fn list(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> std::result::Result<Listing, RemoteError> {
        let url = self.contents_url(repo, path);
        let what = if path.is_empty() { "/" } else { path };
        let response = self.get_api(url, what).await?;

        match read_json::<ContentsResponse>(response).await? {
            ContentsResponse::Single(item) => match item.into_entry() {
                Some(Ok(entry)) if entry.kind == crate::types::EntryKind::File => {
                    Ok(Listing::File(entry))
                }
                Some(Err(e)) => Err(e),
                _ => Err(RemoteError::UnexpectedShape(format!(
                    "'{}' is neither a file nor a directory",
                    what
                ))),
            },
            ContentsResponse::Directory(items) => {
                let entries = items
                    .into_iter()
                    .filter_map(ContentItem::into_entry)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Listing::Directory(entries))
            }
        }
    }
}

#[async_trait]
impl FileFetcher for GitHubClient {
    async fn fetch(&self, entry: &RemoteEntry) -> std::result::Result<ByteStream, RemoteError> {
        let url = entry.download_ref.as_ref().ok_or_else(|| {
            RemoteError::UnexpectedShape(format!("'{}' has no download URL", entry.remote_path))
        })?;

        tracing::debug!(remote_path = %entry.remote_path, url = url.as_str(), "Fetching file");
        let response = self.http.get(url.as_str()).send().await?;
        let response = check_status(response, &entry.remote_path).await?;

        let chunks = stream::try_unfold(response, |mut response| async move {
            let chunk = response
                .chunk()
                .await
                .map_err(|e| RemoteError::Stream(e.to_string()))?;
            Ok::<_, RemoteError>(chunk.map(|chunk| (chunk, response)))
        });
        Ok(chunks.boxed())
    }
}
