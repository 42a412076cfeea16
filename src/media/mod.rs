//! Media directory collaborator.
//!
//! Scans the media directory at startup, watches it for changes, and rescans
//! on request. A scan reports the whole directory: `SetRemoved` for files
//! that went away since the last report, `SetAdded` for every file found,
//! then `ScanCompleted`. Other sources may have replaced the set in the
//! meantime, so files already reported are sent again; the registry ignores
//! the ones it still holds.

pub mod watch;

pub use watch::FsChange;

use crate::control::{ControlEvent, MediaItem};
use image::ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use walkdir::WalkDir;

/// Media errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to watch media directory: {0}")]
    Watch(#[from] notify::Error),
}

/// Decides which files count as media
#[derive(Debug, Clone)]
pub struct MediaFilter {
    extensions: Vec<String>,
    verify_format: bool,
}

impl MediaFilter {
    pub fn new(extensions: &[String], verify_format: bool) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
            verify_format,
        }
    }

    /// Check extension (case-insensitive) and, optionally, the content
    pub fn accepts(&self, path: &Path) -> bool {
        let extension_ok = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext));

        if !extension_ok || !self.verify_format {
            return extension_ok;
        }

        // `ImageReader::open` would take the format from the extension
        let sniffed = File::open(path)
            .and_then(|file| ImageReader::new(BufReader::new(file)).with_guessed_format());

        match sniffed {
            Ok(reader) => reader.format().is_some(),
            Err(e) => {
                tracing::debug!("Cannot sniff {}: {}", path.display(), e);
                false
            }
        }
    }
}

/// Scan `dir` non-recursively, sorted by file name
pub fn scan(dir: &Path, filter: &MediaFilter) -> Result<Vec<MediaItem>, MediaError> {
    let mut items = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| MediaError::Scan {
            path: dir.to_path_buf(),
            source,
        })?;

        if entry.file_type().is_file() && filter.accepts(entry.path()) {
            items.push(item_for(entry.path()));
        }
    }

    Ok(items)
}

fn item_for(path: &Path) -> MediaItem {
    MediaItem::new(path.to_string_lossy())
}

/// Map an identifier from another source onto the id a scan of `dir` gives
///
/// `dir` must be canonical. Ids naming a file directly inside `dir`, either
/// by absolute path or relative to it (`gifs/cat.gif` is looked up as
/// `cat.gif`), become `dir/<file name>`. Anything else, remote URLs
/// included, is kept as given.
pub fn resolve_item(dir: &Path, id: &str) -> MediaItem {
    if id.starts_with("http://") || id.starts_with("https://") {
        return MediaItem::new(id);
    }

    let path = Path::new(id);
    let candidates = if path.is_absolute() {
        vec![path.to_path_buf()]
    } else {
        let mut relative = vec![dir.join(path)];
        relative.extend(path.file_name().map(|name| dir.join(name)));
        relative
    };

    candidates
        .iter()
        .find_map(|candidate| directly_inside(dir, candidate))
        .map(|path| item_for(&path))
        .unwrap_or_else(|| MediaItem::new(id))
}

fn directly_inside(dir: &Path, candidate: &Path) -> Option<PathBuf> {
    let name = candidate.file_name()?;
    let parent = candidate.parent()?.canonicalize().ok()?;
    let path = dir.join(name);
    (parent == dir && path.is_file()).then_some(path)
}

/// The set of items reported to the controller so far
#[derive(Debug)]
pub struct MediaLibrary {
    dir: PathBuf,
    filter: MediaFilter,
    known: Vec<MediaItem>,
}

impl MediaLibrary {
    /// The directory is canonicalized so scan and watch paths agree
    pub fn new(dir: &Path, filter: MediaFilter) -> Self {
        let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        Self {
            dir,
            filter,
            known: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full scan of the directory
    pub fn rescan(&mut self) -> Vec<ControlEvent> {
        let mut events = Vec::new();

        match scan(&self.dir, &self.filter) {
            Ok(found) => {
                let gone: Vec<&MediaItem> =
                    self.known.iter().filter(|i| !found.contains(i)).collect();
                tracing::info!(
                    "Scanned {}: {} media files, {} gone",
                    self.dir.display(),
                    found.len(),
                    gone.len()
                );

                events.extend(gone.into_iter().cloned().map(ControlEvent::SetRemoved));
                events.extend(found.iter().cloned().map(ControlEvent::SetAdded));
                self.known = found;
            }
            Err(e) => tracing::error!("{}", e),
        }

        events.push(ControlEvent::ScanCompleted);
        events
    }

    /// Translate one filesystem change into a set delta
    pub fn apply(&mut self, change: FsChange) -> Option<ControlEvent> {
        match change {
            FsChange::Created(path) => {
                if !path.is_file() || !self.filter.accepts(&path) {
                    return None;
                }
                let item = item_for(&path);
                if self.known.contains(&item) {
                    return None;
                }
                self.known.push(item.clone());
                Some(ControlEvent::SetAdded(item))
            }
            FsChange::Removed(path) => {
                let item = item_for(&path);
                let index = self.known.iter().position(|i| *i == item)?;
                self.known.remove(index);
                Some(ControlEvent::SetRemoved(item))
            }
        }
    }
}

/// Run the media collaborator until shutdown
pub async fn run(
    mut library: MediaLibrary,
    events: mpsc::Sender<ControlEvent>,
    mut rescan: mpsc::Receiver<()>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let (fs_tx, mut fs_rx) = mpsc::channel(64);

    let _watcher = match watch::watch_dir(library.dir(), fs_tx) {
        Ok(watcher) => {
            tracing::info!("Watching {}", library.dir().display());
            Some(watcher)
        }
        Err(e) => {
            tracing::error!("{}", e);
            None
        }
    };

    if !forward(&events, library.rescan()).await {
        return;
    }

    loop {
        tokio::select! {
            Some(change) = fs_rx.recv() => {
                if let Some(event) = library.apply(change) {
                    if !forward(&events, vec![event]).await {
                        break;
                    }
                }
            }
            Some(()) = rescan.recv() => {
                if !forward(&events, library.rescan()).await {
                    break;
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Media watcher shutting down");
                break;
            }
        }
    }
}

async fn forward(events: &mpsc::Sender<ControlEvent>, batch: Vec<ControlEvent>) -> bool {
    for event in batch {
        if events.send(event).await.is_err() {
            tracing::debug!("Controller gone, stopping media watcher");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{DisplayStateMachine, Power};
    use std::fs;

    fn gif_filter() -> MediaFilter {
        MediaFilter::new(&["gif".to_string()], false)
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"GIF89a").unwrap();
        path
    }

    fn ids(events: &[ControlEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                ControlEvent::SetAdded(i) => format!("+{}", Path::new(i.id()).file_name().unwrap().to_string_lossy()),
                ControlEvent::SetRemoved(i) => format!("-{}", Path::new(i.id()).file_name().unwrap().to_string_lossy()),
                other => format!("{:?}", other),
            })
            .collect()
    }

    #[test]
    fn filter_matches_extension_case_insensitively() {
        let filter = MediaFilter::new(&[".GIF".to_string()], false);
        assert!(filter.accepts(Path::new("/x/cat.gif")));
        assert!(filter.accepts(Path::new("/x/cat.Gif")));
        assert!(!filter.accepts(Path::new("/x/cat.png")));
        assert!(!filter.accepts(Path::new("/x/gif")));
    }

    #[test]
    fn verify_format_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let good = touch(dir.path(), "good.gif");
        let bad = dir.path().join("bad.gif");
        fs::write(&bad, b"definitely not an image").unwrap();

        let filter = MediaFilter::new(&["gif".to_string()], true);
        assert!(filter.accepts(&good));
        assert!(!filter.accepts(&bad));
    }

    #[test]
    fn scan_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.gif");
        touch(dir.path(), "a.GIF");
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("sub.gif")).unwrap();
        touch(&dir.path().join("sub.gif"), "nested.gif");

        let items = scan(dir.path(), &gif_filter()).unwrap();
        let names: Vec<String> = items
            .iter()
            .map(|i| Path::new(i.id()).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.GIF", "b.gif"]);
    }

    #[test]
    fn rescan_reports_removals_then_the_whole_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.gif");
        touch(dir.path(), "b.gif");

        let mut library = MediaLibrary::new(dir.path(), gif_filter());
        assert_eq!(ids(&library.rescan()), ["+a.gif", "+b.gif", "ScanCompleted"]);

        fs::remove_file(dir.path().join("a.gif")).unwrap();
        touch(dir.path(), "c.gif");
        assert_eq!(
            ids(&library.rescan()),
            ["-a.gif", "+b.gif", "+c.gif", "ScanCompleted"]
        );
        assert_eq!(ids(&library.rescan()), ["+b.gif", "+c.gif", "ScanCompleted"]);
    }

    #[test]
    fn rescan_restores_a_set_replaced_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.gif");
        touch(dir.path(), "b.gif");

        let mut library = MediaLibrary::new(dir.path(), gif_filter());
        let mut machine = DisplayStateMachine::new(Power::On);
        for event in library.rescan() {
            machine.apply(event);
        }
        assert_eq!(machine.media().len(), 2);

        // NO_GIFS from the network empties the set behind the library's back
        machine.apply(ControlEvent::SetReplaced(Vec::new()));
        assert_eq!(machine.current_index(), None);

        for event in library.rescan() {
            machine.apply(event);
        }
        assert_eq!(machine.media().len(), 2);
        assert_eq!(machine.current_index(), Some(0));
        assert!(machine.shown().is_some_and(|i| i.id().ends_with("a.gif")));
    }

    #[test]
    fn foreign_ids_resolve_to_scanned_ids() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path(), gif_filter());
        let path = touch(library.dir(), "cat.gif");
        let scanned = item_for(&path);

        assert_eq!(resolve_item(library.dir(), "gifs/cat.gif"), scanned);
        assert_eq!(resolve_item(library.dir(), "cat.gif"), scanned);
        assert_eq!(resolve_item(library.dir(), scanned.id()), scanned);

        for kept in ["gifs/dog.gif", "/elsewhere/cat.gif", "https://example.com/cat.gif"] {
            assert_eq!(resolve_item(library.dir(), kept), MediaItem::new(kept));
        }
    }

    #[test]
    fn missing_directory_still_completes_scan() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = MediaLibrary::new(&dir.path().join("missing"), gif_filter());
        assert_eq!(library.rescan(), [ControlEvent::ScanCompleted]);
    }

    #[test]
    fn filesystem_changes_become_deltas() {
        let dir = tempfile::tempdir().unwrap();
        let mut library = MediaLibrary::new(dir.path(), gif_filter());
        library.rescan();

        let path = touch(library.dir(), "new.gif");
        let added = library.apply(FsChange::Created(path.clone()));
        assert!(matches!(added, Some(ControlEvent::SetAdded(_))));
        assert_eq!(library.apply(FsChange::Created(path.clone())), None);

        let text = touch(library.dir(), "readme.txt");
        assert_eq!(library.apply(FsChange::Created(text)), None);

        fs::remove_file(&path).unwrap();
        assert!(matches!(
            library.apply(FsChange::Removed(path.clone())),
            Some(ControlEvent::SetRemoved(_))
        ));
        assert_eq!(library.apply(FsChange::Removed(path)), None);
    }

    #[tokio::test]
    async fn run_reports_initial_scan_and_rescans() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.gif");

        let library = MediaLibrary::new(dir.path(), gif_filter());
        let (tx, mut rx) = mpsc::channel(16);
        let (rescan_tx, rescan_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run(library, tx, rescan_rx, shutdown_rx));

        assert!(matches!(rx.recv().await, Some(ControlEvent::SetAdded(_))));
        assert_eq!(rx.recv().await, Some(ControlEvent::ScanCompleted));

        rescan_tx.send(()).await.unwrap();
        assert!(matches!(rx.recv().await, Some(ControlEvent::SetAdded(_))));
        assert_eq!(rx.recv().await, Some(ControlEvent::ScanCompleted));

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
