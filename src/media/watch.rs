//! Filesystem watch glue.

use super::MediaError;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// A file appeared or disappeared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    Created(PathBuf),
    Removed(PathBuf),
}

/// Watch `dir` (non-recursive) and forward changes on `tx`
///
/// The watcher stops when the returned value is dropped.
pub fn watch_dir(dir: &Path, tx: mpsc::Sender<FsChange>) -> Result<RecommendedWatcher, MediaError> {
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Filesystem watch error: {}", e);
                return;
            }
        };

        for change in changes_for(event) {
            if tx.blocking_send(change).is_err() {
                return;
            }
        }
    })?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Translate a notify event into file-level changes
///
/// Content writes count as `Created` so a file that only becomes a valid
/// image once fully written is picked up; already-known files are ignored
/// further down.
pub fn changes_for(event: Event) -> Vec<FsChange> {
    let mut paths = event.paths.into_iter();

    match event.kind {
        EventKind::Create(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any)
        | EventKind::Modify(ModifyKind::Name(RenameMode::To))
        | EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            paths.map(FsChange::Created).collect()
        }
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.map(FsChange::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let from = paths.next().map(FsChange::Removed);
            let to = paths.next().map(FsChange::Created);
            from.into_iter().chain(to).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .map(|p| {
                if p.exists() {
                    FsChange::Created(p)
                } else {
                    FsChange::Removed(p)
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}
