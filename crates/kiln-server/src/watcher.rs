//! File watching for the rebuild loop.

use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A change to one file under a watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
}

/// Recursive watcher over a single root.
///
/// Every create, modify and remove event is forwarded as it arrives; nothing
/// is debounced or coalesced.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `root`.
    ///
    /// Returns the watcher and a channel to receive events. Events stop when
    /// the watcher is dropped.
    pub fn new(
        root: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    let Some(kind) = classify(&event.kind) else {
                        return;
                    };
                    for path in event.paths {
                        let _ = tx.send(WatchEvent { kind, path });
                    }
                }
                Err(e) => tracing::warn!("Watch error: {}", e),
            }
        })?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok((Self { _watcher: watcher }, rx))
    }
}

fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        _ => None,
    }
}
