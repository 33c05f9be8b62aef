//! Utility functions for file operations and path manipulation

use std::path::{Component, Path, PathBuf};

/// Directory name used when the repository name itself is not a usable path component
const FALLBACK_ROOT: &str = "repository";

/// Map a remote file path to its local path below the output directory
///
/// The local tree is always rooted at a folder named after the repository. With an
/// empty `base_path` (whole repository) the remote path is kept as-is below that
/// folder; otherwise the part of the remote path above `base_path` is dropped so the
/// requested subtree is re-rooted under the repository folder.
///
/// The function never fails. Components that could escape the root are neutralized:
/// empty and `.` components are skipped, `..` only climbs within the path built so
/// far, and anything that is not a plain file name (drive prefixes, root markers) is
/// dropped. When the requested path is the file itself, the file's name is used.
///
/// # Examples
///
/// ```
/// use partial_git::utils::map_local_path;
/// use std::path::PathBuf;
///
/// assert_eq!(
///     map_local_path("src", "repo", "src/util/x.go"),
///     PathBuf::from("repo/util/x.go")
/// );
/// assert_eq!(
///     map_local_path("", "repo", "a/b/c.txt"),
///     PathBuf::from("repo/a/b/c.txt")
/// );
/// ```
#[must_use]
pub fn map_local_path(base_path: &str, repo_name: &str, remote_path: &str) -> PathBuf {
    let base = normalize(base_path);
    let remote = normalize(remote_path);

    let common = base
        .iter()
        .zip(remote.iter())
        .take_while(|(b, r)| b == r)
        .count();

    let relative: &[&str] = if remote.len() > common {
        &remote[common..]
    } else {
        // The requested path is the file itself (or an ancestor of the base).
        remote.last().map(std::slice::from_ref).unwrap_or(&[])
    };

    let mut local = PathBuf::from(root_name(repo_name));
    local.extend(relative);
    local
}

/// Split a `/`-separated remote path into safe components
fn normalize(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other if is_plain_component(other) => parts.push(other),
            other => {
                tracing::warn!(component = other, path, "Dropping unsafe path component");
            }
        }
    }
    parts
}

/// True when `part` is exactly one normal path component on this platform
fn is_plain_component(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn root_name(repo_name: &str) -> &str {
    normalize(repo_name)
        .last()
        .copied()
        .unwrap_or(FALLBACK_ROOT)
}

/// Create `dir` and all missing parents, owner-only permissions on Unix
///
/// Succeeds when the directory already exists.
pub async fn create_private_dir_all(dir: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await
}

/// Create (or truncate) `path` for writing, owner read/write on Unix
pub async fn create_private_file(path: &Path) -> std::io::Result<tokio::fs::File> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path).await
}
