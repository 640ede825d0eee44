// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Discovery of screenshots: one-off directory scan and continuous watching

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::matcher::is_screenshot_name;
use crate::queue::WorkQueue;
use crate::Result;

/// How long a file must stop growing before it is considered written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityWindow {
    pub threshold: Duration,
    pub poll_interval: Duration,
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Events emitted by the watcher
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A file appeared in the directory, by creation or by being renamed in
    FileAdded(PathBuf),
    /// Watcher error
    Error(String),
}

/// Non-recursive watcher over a single directory
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    dir: PathBuf,
    event_rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Start watching `dir` (not its subdirectories)
    pub fn new(dir: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let config = Config::default().with_poll_interval(Duration::from_secs(2));

        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| {
                let _ = tx.send(event);
            },
            config,
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", dir);

        Ok(Self {
            _watcher: watcher,
            dir: dir.to_path_buf(),
            event_rx: rx,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Next relevant event; `None` once the watcher is gone
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        loop {
            match self.event_rx.recv().await? {
                Ok(event) => {
                    if let Some(event) = convert_event(event) {
                        return Some(event);
                    }
                }
                Err(e) => return Some(WatchEvent::Error(e.to_string())),
            }
        }
    }
}

/// Convert a notify event to our event type
fn convert_event(event: Event) -> Option<WatchEvent> {
    match event.kind {
        EventKind::Create(_) => event.paths.first().cloned().map(WatchEvent::FileAdded),
        // macOS writes screenshots under a hidden name, then renames them
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.first().cloned().map(WatchEvent::FileAdded)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1).cloned().map(WatchEvent::FileAdded)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .first()
            .filter(|p| p.exists())
            .cloned()
            .map(WatchEvent::FileAdded),
        _ => None,
    }
}

/// Screenshots already sitting in `dir`, sorted by name
///
/// Only regular files count; symlinks and folders are ignored.
pub async fn scan_existing(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_file = match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        };
        if !is_file {
            continue;
        }

        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(is_screenshot_name)
            .unwrap_or(false);
        if matches {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

/// Wait for file to be stable (not being written)
///
/// Returns false if the file disappears while waiting.
pub async fn wait_for_stable(path: &Path, window: StabilityWindow) -> bool {
    let mut last_size = match tokio::fs::metadata(path).await {
        Ok(m) => m.len(),
        Err(_) => return false,
    };
    let mut unchanged_for = Duration::ZERO;

    while unchanged_for < window.threshold {
        tokio::time::sleep(window.poll_interval).await;

        let current_size = match tokio::fs::metadata(path).await {
            Ok(m) => m.len(),
            Err(_) => return false,
        };

        if current_size == last_size {
            unchanged_for += window.poll_interval;
        } else {
            debug!("File {:?} still being written, size: {}", path, current_size);
            last_size = current_size;
            unchanged_for = Duration::ZERO;
        }
    }

    true
}

/// Feed every new, fully written file into the queue until the watcher stops
///
/// Watcher errors are logged and watching continues.
pub async fn watch_into_queue(
    mut watcher: FileWatcher,
    queue: WorkQueue,
    window: StabilityWindow,
) {
    let settling: Arc<Mutex<HashSet<PathBuf>>> = Arc::default();

    while let Some(event) = watcher.next_event().await {
        match event {
            WatchEvent::FileAdded(path) => {
                if path.is_dir() {
                    continue;
                }
                let newly_seen = settling
                    .lock()
                    .map(|mut set| set.insert(path.clone()))
                    .unwrap_or(false);
                if !newly_seen {
                    continue;
                }

                let queue = queue.clone();
                let settling = settling.clone();
                tokio::spawn(async move {
                    if wait_for_stable(&path, window).await {
                        queue.push(&path);
                    } else {
                        debug!("File disappeared during stability check: {:?}", path);
                    }
                    if let Ok(mut set) = settling.lock() {
                        set.remove(&path);
                    }
                });
            }
            WatchEvent::Error(e) => {
                warn!("Error while watching {:?}: {}", watcher.dir(), e);
            }
        }
    }

    warn!("Watcher for {:?} stopped", watcher.dir());
}
