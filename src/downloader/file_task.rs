//! Single-file download task: resolve the local path, stream bytes to disk.

use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::context::SessionContext;
use crate::config::PathCollisionAction;
use crate::error::{Error, Result};
use crate::types::{Event, RemoteEntry};
use crate::utils::{create_private_dir_all, create_private_file, map_local_path};

/// How a transfer ended when it did not fail
enum Transfer {
    Written { local_path: PathBuf, bytes: u64 },
    Aborted,
}

/// Download one file, reporting any failure to the session.
pub(crate) async fn download_file(ctx: Arc<SessionContext>, entry: RemoteEntry) {
    match transfer(&ctx, &entry).await {
        Ok(Transfer::Written { local_path, bytes }) => {
            ctx.counters.file_completed(bytes);
            tracing::debug!(
                remote_path = %entry.remote_path,
                local_path = %local_path.display(),
                bytes,
                "Downloaded file"
            );
            ctx.emit(Event::FileCompleted {
                remote_path: entry.remote_path,
                local_path,
                bytes,
            });
        }
        Ok(Transfer::Aborted) => {
            tracing::debug!(remote_path = %entry.remote_path, "File download aborted");
        }
        Err(e) => ctx.report(e),
    }
}

async fn transfer(ctx: &SessionContext, entry: &RemoteEntry) -> Result<Transfer> {
    if ctx.cancel_token.is_cancelled() {
        return Ok(Transfer::Aborted);
    }

    let relative = map_local_path(
        &ctx.request.base_path,
        &ctx.request.repo.repo,
        &entry.remote_path,
    );
    let local_path = ctx.output_dir.join(relative);

    let claim = ctx.claim_local_path(&local_path);
    if !claim.first && ctx.path_collision == PathCollisionAction::Fail {
        return Err(Error::PathCollision {
            path: entry.remote_path.clone(),
            local_path,
        });
    }

    let local_io = |source: std::io::Error| Error::LocalIo {
        path: entry.remote_path.clone(),
        local_path: local_path.clone(),
        source,
    };
    let transfer_error = |source| Error::Transfer {
        path: entry.remote_path.clone(),
        source,
    };

    let Some(_slot) = ctx.acquire_request_slot().await else {
        return Ok(Transfer::Aborted);
    };

    ctx.emit(Event::FileStarted {
        remote_path: entry.remote_path.clone(),
    });

    let mut stream = tokio::select! {
        _ = ctx.cancel_token.cancelled() => return Ok(Transfer::Aborted),
        result = ctx.fetcher.fetch(entry) => result.map_err(transfer_error)?,
    };

    // Last writer to take the lock wins; writers never interleave.
    let _write_guard = tokio::select! {
        _ = ctx.cancel_token.cancelled() => return Ok(Transfer::Aborted),
        guard = claim.write_lock.lock() => guard,
    };

    if let Some(parent) = local_path.parent() {
        create_private_dir_all(parent).await.map_err(local_io)?;
    }
    let mut file = create_private_file(&local_path).await.map_err(local_io)?;

    let mut bytes = 0u64;
    loop {
        let next = tokio::select! {
            _ = ctx.cancel_token.cancelled() => return Ok(Transfer::Aborted),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                file.write_all(&chunk).await.map_err(local_io)?;
                bytes += chunk.len() as u64;
            }
            Some(Err(source)) => return Err(transfer_error(source)),
            None => break,
        }
    }
    file.flush().await.map_err(local_io)?;

    Ok(Transfer::Written { local_path, bytes })
}
