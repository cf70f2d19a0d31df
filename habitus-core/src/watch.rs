//! Debounced transcript change watcher
//!
//! Observes the transcript root for file creation and modification and
//! triggers the sync engine once per burst of activity on a given path.
//! Watching the root recursively covers both existing project directories and
//! ones created after startup, with no re-subscription needed.
//!
//! Transcripts are appended incrementally and rapidly during an active
//! session; the debouncer keeps a single pending deadline per path, so a
//! burst of appends produces one sync attempt after the window elapses
//! quietly. A sync attempt that fails (file mid-write, temporarily truncated)
//! is swallowed and picked up again on the next notification.
//!
//! Sync events fan out to subscribers over channels; a subscriber that went
//! away is dropped without affecting delivery to the others.

use crate::error::Result;
use crate::ingest::SyncEngine;
use crate::types::SyncEvent;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Subscribers = Arc<Mutex<Vec<Sender<SyncEvent>>>>;

/// Live watcher over a transcript root directory.
///
/// Dropping the watcher (or calling [`TranscriptWatcher::shutdown`]) closes
/// the filesystem subscription and cancels all pending debounce timers; an
/// in-flight sync is not retried until the next start performs a fresh
/// catch-up.
pub struct TranscriptWatcher {
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    subscribers: Subscribers,
}

impl TranscriptWatcher {
    /// Start watching the engine's transcript root.
    pub fn start(engine: Arc<SyncEngine>, debounce: Duration) -> Result<Self> {
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let root = engine.root().to_path_buf();

        let handler_subs = Arc::clone(&subscribers);
        let mut debouncer = new_debouncer(debounce, move |res: DebounceEventResult| match res {
            Ok(events) => {
                for event in events {
                    let path = event.path;
                    let is_transcript = path
                        .extension()
                        .map(|ext| ext == "jsonl")
                        .unwrap_or(false);
                    if !is_transcript {
                        continue;
                    }

                    match engine.sync_file(&path) {
                        Ok(sync_events) => broadcast(&handler_subs, sync_events),
                        Err(e) => {
                            // Swallowed: the file will be picked up again on
                            // the next notification
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "Sync attempt failed, will retry on next change"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = ?e, "Filesystem watcher reported errors");
            }
        })?;

        debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)?;

        tracing::info!(
            root = %root.display(),
            debounce_ms = debounce.as_millis() as u64,
            "Watching transcript root"
        );

        Ok(Self {
            debouncer: Some(debouncer),
            subscribers,
        })
    }

    /// Subscribe to sync events. Each subscriber gets its own channel.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Stop watching: close the filesystem subscription and cancel all
    /// pending debounce timers.
    pub fn shutdown(&mut self) {
        self.debouncer.take();
        self.subscribers.lock().unwrap().clear();
    }
}

impl Drop for TranscriptWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Deliver events to every live subscriber, dropping the ones that went away.
fn broadcast(subscribers: &Subscribers, events: Vec<SyncEvent>) {
    if events.is_empty() {
        return;
    }

    let mut subs = subscribers.lock().unwrap();
    subs.retain(|tx| {
        events.iter().all(|event| tx.send(event.clone()).is_ok())
    });
}
