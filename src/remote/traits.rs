//! Capabilities the download engine consumes

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::RemoteError;
use crate::types::{Listing, RemoteEntry, RepoRef};

/// Stream of file chunks produced by a [`FileFetcher`]
pub type ByteStream = BoxStream<'static, Result<Bytes, RemoteError>>;

/// Lists a remote path
///
/// Implementations must be cancel-safe: the engine drops the returned future when
/// the session is cancelled or its deadline fires, which must abort the request.
///
/// # Errors
///
/// Returns [`RemoteError::NotFound`] when the path or repository does not exist (or
/// is not visible with the current credentials), and
/// [`RemoteError::RateLimited`] / [`RemoteError::Forbidden`] when the remote refuses
/// the call, so callers can tell access problems from transport failures.
#[async_trait]
pub trait ContentLister: Send + Sync {
    /// List `path` in `repo`
    ///
    /// Returns [`Listing::File`] when `path` is a file and [`Listing::Directory`] with
    /// the children in remote order otherwise.
    async fn list(&self, repo: &RepoRef, path: &str) -> Result<Listing, RemoteError>;
}

/// Streams a file's bytes
///
/// Dropping the returned stream (or the pending future) aborts the transfer.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Open a byte stream for `entry`
    async fn fetch(&self, entry: &RemoteEntry) -> Result<ByteStream, RemoteError>;
}
