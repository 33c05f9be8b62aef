//! Common test utilities for partial-git integration tests

#![allow(dead_code)]

use partial_git::{Config, GitHubConfig};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OWNER: &str = "octo";
pub const REPO: &str = "widgets";

/// Config pointing the GitHub client at `server` and writing under `output_dir`
pub fn config_for(server: &MockServer, output_dir: &Path) -> Config {
    Config {
        output_dir: output_dir.to_path_buf(),
        deadline: Duration::from_secs(10),
        max_concurrent_requests: 4,
        github: GitHubConfig {
            api_base_url: server.uri(),
            request_timeout: Duration::from_secs(5),
            ..GitHubConfig::default()
        },
        ..Config::default()
    }
}

/// Contents API item for a file served from `/raw/<path>`
pub fn file_item(server: &MockServer, remote_path: &str) -> Value {
    json!({
        "name": remote_path.rsplit('/').next().unwrap_or(remote_path),
        "path": remote_path,
        "type": "file",
        "download_url": format!("{}/raw/{}", server.uri(), remote_path),
    })
}

/// Contents API item for a directory
pub fn dir_item(remote_path: &str) -> Value {
    json!({
        "name": remote_path.rsplit('/').next().unwrap_or(remote_path),
        "path": remote_path,
        "type": "dir",
        "download_url": null,
    })
}

/// Serve `items` as the listing of `remote_path`
pub async fn mount_listing(server: &MockServer, remote_path: &str, items: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/{OWNER}/{REPO}/contents/{remote_path}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(items)))
        .mount(server)
        .await;
}

/// Serve `body` as the raw content of `remote_path`
pub async fn mount_raw(server: &MockServer, remote_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/raw/{remote_path}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Every regular file under `root`, keyed by path relative to `root`
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
            Some((relative, std::fs::read(entry.path()).ok()?))
        })
        .collect()
}
