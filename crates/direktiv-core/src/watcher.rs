//! Change notification for the documents tree
//!
//! Best effort: events can be coalesced or dropped when nobody drains the
//! channel. Callers use them as a hint to re-query, never as a source of
//! truth.

use std::path::{Path, PathBuf};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::{LibraryError, LibraryResult};
use crate::paths;

const CHANNEL_CAPACITY: usize = 100;

/// A markdown file under `documents/` was created, modified or removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    Changed { paths: Vec<PathBuf> },
}

pub struct LibraryWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<LibraryEvent>,
}

impl LibraryWatcher {
    /// Watch `documents_dir` recursively
    pub fn new(documents_dir: &Path) -> LibraryResult<Self> {
        if !documents_dir.is_dir() {
            return Err(LibraryError::invalid_path(documents_dir, "not a directory"));
        }

        let (tx, rx) = bounded::<LibraryEvent>(CHANNEL_CAPACITY);
        let watcher = create_watcher(tx, documents_dir)?;
        debug!("Watching {:?}", documents_dir);

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    pub fn receiver(&self) -> &Receiver<LibraryEvent> {
        &self.receiver
    }

    /// Drain pending events; true if there were any
    pub fn check_events(&self) -> bool {
        let mut has_events = false;
        while self.receiver.try_recv().is_ok() {
            has_events = true;
        }
        has_events
    }
}

fn create_watcher(tx: Sender<LibraryEvent>, path: &Path) -> LibraryResult<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }

                let changed: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| paths::is_markdown(p))
                    .collect();
                if changed.is_empty() {
                    return;
                }

                // A full channel already tells the consumer to re-query
                if let Err(TrySendError::Disconnected(_)) =
                    tx.try_send(LibraryEvent::Changed { paths: changed })
                {
                    debug!("Watcher receiver dropped");
                }
            }
            Err(e) => warn!("Watch error: {}", e),
        }
    })?;

    watcher.watch(path, RecursiveMode::Recursive)?;

    Ok(watcher)
}
