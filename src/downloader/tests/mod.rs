use super::*;
use crate::config::PathCollisionAction;
use crate::downloader::test_helpers::{
    CHUNK_SIZE, FakeRemote, Fault, snapshot, test_config, test_request, test_session,
};
use crate::error::{Error, ErrorKind, RemoteError};
use crate::types::{Event, RemoteEntry, SessionState};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::tempdir;


/// Build the expected snapshot from `(relative path, content)` pairs
fn expected(files: &[(&str, &[u8])]) -> std::collections::BTreeMap<PathBuf, Vec<u8>> {
    files
        .iter()
        .map(|(path, content)| (PathBuf::from(path), content.to_vec()))
        .collect()
}
