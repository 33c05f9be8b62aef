//! Recursive walk of the remote tree.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::context::SessionContext;
use super::file_task::download_file;
use crate::error::Error;
use crate::types::{EntryKind, Event, Listing, RemoteEntry};

/// List `remote_path` and fan out one tracked task per entry.
///
/// Files go to [`download_file`], directories recurse. Listing order is kept and
/// duplicates are not filtered. Errors go to the session; nothing is returned.
///
/// Boxed because the walk spawns itself.
pub(crate) fn walk(ctx: Arc<SessionContext>, remote_path: String) -> BoxFuture<'static, ()> {
    async move {
        if ctx.cancel_token.is_cancelled() {
            tracing::debug!(remote_path = %remote_path, "Session finished, not listing");
            return;
        }

        let listing = {
            let Some(_slot) = ctx.acquire_request_slot().await else {
                return;
            };
            tokio::select! {
                _ = ctx.cancel_token.cancelled() => {
                    tracing::debug!(remote_path = %remote_path, "Listing aborted");
                    return;
                }
                result = ctx.lister.list(&ctx.request.repo, &remote_path) => result,
            }
        };

        match listing {
            Err(source) => ctx.report(Error::Listing {
                path: remote_path,
                source,
            }),
            Ok(Listing::File(entry)) => {
                spawn_entry(&ctx, entry);
            }
            Ok(Listing::Directory(entries)) => {
                ctx.counters.directory_listed();
                tracing::debug!(
                    remote_path = %remote_path,
                    entries = entries.len(),
                    "Listed directory"
                );
                ctx.emit(Event::DirectoryListed {
                    remote_path,
                    entries: entries.len(),
                });

                for entry in entries {
                    if ctx.cancel_token.is_cancelled() {
                        return;
                    }
                    spawn_entry(&ctx, entry);
                }
            }
        }
    }
    .boxed()
}

fn spawn_entry(ctx: &Arc<SessionContext>, entry: RemoteEntry) {
    match entry.kind {
        EntryKind::File => {
            ctx.counters.file_discovered();
            ctx.tracker.spawn(download_file(Arc::clone(ctx), entry));
        }
        EntryKind::Directory => {
            ctx.tracker
                .spawn(walk(Arc::clone(ctx), entry.remote_path));
        }
    }
}
