//! Remote repository access
//!
//! The download engine only talks to the remote through two capabilities:
//!
//! - [`ContentLister`]: resolves a path to a single file or an ordered directory listing
//! - [`FileFetcher`]: streams the bytes of a listed file
//!
//! [`GitHubClient`] implements both against the GitHub REST API. Tests and embedders
//! can supply their own implementations through
//! [`Downloader::with_remote`](crate::Downloader::with_remote).

mod github;
mod traits;

pub use github::{GitHubClient, RateLimitStatus};
pub use traits::{ByteStream, ContentLister, FileFetcher};
