//! Shared test helpers: an in-memory remote and filesystem snapshots.

use crate::config::Config;
use crate::downloader::DownloadSession;
use crate::error::RemoteError;
use crate::remote::{ByteStream, ContentLister, FileFetcher};
use crate::types::{DownloadRequest, EntryKind, Listing, RemoteEntry, RepoRef};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Size of the chunks the fake streams file content in
pub(crate) const CHUNK_SIZE: usize = 7;

/// Misbehaviour injected for one path
#[derive(Clone, Debug)]
pub(crate) enum Fault {
    /// Respond with an HTTP-style status error
    Fail(u16),
    /// Respond with NotFound
    NotFound,
    /// Never respond
    Hang,
    /// Respond normally after a delay
    Delay(Duration),
    /// Yield the first chunk, then a stream error (fetch only)
    BreakStream,
}

/// In-memory repository implementing both remote capabilities.
///
/// Directory listings are derived from the file paths (sorted), unless
/// overridden with [`FakeRemote::with_listing`].
#[derive(Default)]
pub(crate) struct FakeRemote {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    listings: HashMap<String, Vec<RemoteEntry>>,
    list_faults: HashMap<String, Fault>,
    fetch_faults: HashMap<String, Fault>,
    fetch_latency: Duration,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.insert(path.to_string(), content.as_ref().to_vec());
        self
    }

    pub(crate) fn with_dir(mut self, path: &str) -> Self {
        self.dirs.insert(path.to_string());
        self
    }

    /// Replace the derived listing of `path`
    pub(crate) fn with_listing(mut self, path: &str, entries: Vec<RemoteEntry>) -> Self {
        self.listings.insert(path.to_string(), entries);
        self
    }

    pub(crate) fn with_list_fault(mut self, path: &str, fault: Fault) -> Self {
        self.list_faults.insert(path.to_string(), fault);
        self
    }

    pub(crate) fn with_fetch_fault(mut self, path: &str, fault: Fault) -> Self {
        self.fetch_faults.insert(path.to_string(), fault);
        self
    }

    /// Delay applied to every fetch before it responds
    pub(crate) fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Most remote calls (listings plus open streams) observed at once
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    fn derived_listing(&self, path: &str) -> Option<Vec<RemoteEntry>> {
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
        for file in self.files.keys() {
            let Some(rest) = file.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(format!("{prefix}{dir}"), EntryKind::Directory);
                }
                None => {
                    children.insert(file.clone(), EntryKind::File);
                }
            }
        }
        for dir in &self.dirs {
            if let Some(rest) = dir.strip_prefix(&prefix)
                && !rest.is_empty()
                && !rest.contains('/')
            {
                children.insert(dir.clone(), EntryKind::Directory);
            }
        }

        if children.is_empty() && !path.is_empty() && !self.dirs.contains(path) {
            return None;
        }

        Some(
            children
                .into_iter()
                .map(|(child, kind)| match kind {
                    EntryKind::File => RemoteEntry::file(child.clone(), format!("fake://{child}")),
                    EntryKind::Directory => RemoteEntry::directory(child),
                })
                .collect(),
        )
    }
}

struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Apply a non-stream fault; returns the error to respond with, if any.
async fn apply_fault(fault: Option<&Fault>, path: &str) -> Option<RemoteError> {
    match fault? {
        Fault::Fail(status) => Some(RemoteError::Status { status: *status }),
        Fault::NotFound => Some(RemoteError::NotFound(path.to_string())),
        Fault::Hang => std::future::pending().await,
        Fault::Delay(delay) => {
            tokio::time::sleep(*delay).await;
            None
        }
        Fault::BreakStream => None,
    }
}

#[async_trait]
impl ContentLister for FakeRemote {
    async fn list(&self, _repo: &RepoRef, path: &str) -> Result<Listing, RemoteError> {
        let _guard = self.enter();
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = apply_fault(self.list_faults.get(path), path).await {
            return Err(error);
        }
        if let Some(entries) = self.listings.get(path) {
            return Ok(Listing::Directory(entries.clone()));
        }
        if self.files.contains_key(path) {
            return Ok(Listing::File(RemoteEntry::file(
                path,
                format!("fake://{path}"),
            )));
        }
        self.derived_listing(path)
            .map(Listing::Directory)
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl FileFetcher for FakeRemote {
    async fn fetch(&self, entry: &RemoteEntry) -> Result<ByteStream, RemoteError> {
        let guard = self.enter();
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let key = entry
            .download_ref
            .as_ref()
            .and_then(|r| r.as_str().strip_prefix("fake://"))
            .unwrap_or(&entry.remote_path)
            .to_string();

        if !self.fetch_latency.is_zero() {
            tokio::time::sleep(self.fetch_latency).await;
        }
        let fault = self.fetch_faults.get(&key);
        if let Some(error) = apply_fault(fault, &key).await {
            return Err(error);
        }

        let content = self
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(key.clone()))?;
        let mut chunks: Vec<Result<Bytes, RemoteError>> = content
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if matches!(fault, Some(Fault::BreakStream)) {
            chunks.truncate(1);
            chunks.push(Err(RemoteError::Stream("connection reset".to_string())));
        }

        // The guard lives as long as the stream
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            let _held = &guard;
            chunk
        });
        Ok(stream.boxed())
    }
}

/// Request for `octo/widgets@main` rooted at `base_path`
pub(crate) fn test_request(base_path: &str) -> DownloadRequest {
    DownloadRequest::new("octo", "widgets", Some("main".to_string()), base_path)
}

/// Config writing under `output_dir` with a short deadline
pub(crate) fn test_config(output_dir: &Path) -> Config {
    Config {
        output_dir: output_dir.to_path_buf(),
        deadline: Duration::from_secs(5),
        max_concurrent_requests: 4,
        ..Config::default()
    }
}

/// Session over `remote` using `config`
pub(crate) fn test_session(
    remote: &Arc<FakeRemote>,
    request: DownloadRequest,
    config: &Config,
) -> DownloadSession {
    DownloadSession::new(request, remote.clone(), remote.clone(), config)
}

/// Every regular file under `root`, keyed by path relative to `root`
pub(crate) fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}
