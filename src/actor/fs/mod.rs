//! FileSystem Actor
//!
//! Owns the only file watcher of the run and turns its events into
//! debounced batches for the build actor. The watcher is created before the
//! initial build so nothing changed during that build is lost.
//!
//! ```text
//! notify ──> bridge thread ──> Debouncer ──Pass──> BuildActor
//!                                  ▲                  │
//!                                  └────── done ──────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use notify::RecommendedWatcher;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::messages::BuildMsg;

mod debouncer;
mod watch_roots;


pub use watch_roots::collect_watch_roots;

use debouncer::Debouncer;
use watch_roots::WatchRoots;

/// Buffer between the notify bridge thread and the actor.
const EVENT_BUFFER: usize = 64;

pub struct FsActor {
    /// Events from notify (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Shared with the related-file watcher, which adds single-path watches.
    watcher: Arc<Mutex<RecommendedWatcher>>,
    watch_roots: WatchRoots,
    debouncer: Debouncer,
}

impl FsActor {
    /// Start watching `roots` recursively. Events under `ignored` are dropped.
    pub fn new(roots: Vec<PathBuf>, ignored: Vec<PathBuf>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut watch_roots = WatchRoots::new(roots);
        watch_roots.attach_existing(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher: Arc::new(Mutex::new(watcher)),
            watch_roots,
            debouncer: Debouncer::new(ignored),
        })
    }

    /// Handle for registering extra watches.
    pub fn watcher(&self) -> Arc<Mutex<RecommendedWatcher>> {
        Arc::clone(&self.watcher)
    }

    /// Run the event loop until the build actor goes away.
    pub async fn run(self, build_tx: mpsc::Sender<BuildMsg>) {
        let Self {
            notify_rx,
            watcher,
            mut watch_roots,
            mut debouncer,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(EVENT_BUFFER);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_event(&event, Instant::now()),
                _ = tokio::time::sleep(debouncer.sleep_duration(Instant::now())) => {
                    watch_roots.maintain(&mut watcher.lock());
                    let Some(changes) = debouncer.take_if_ready(Instant::now()) else {
                        continue;
                    };

                    let (done_tx, mut done_rx) = oneshot::channel();
                    if build_tx.send(BuildMsg::Pass { changes, done: done_tx }).await.is_err() {
                        break;
                    }

                    // Rebuilding: keep collecting for the next cycle.
                    loop {
                        tokio::select! {
                            biased;
                            _ = &mut done_rx => break,
                            Some(event) = async_rx.recv() => debouncer.add_event(&event, Instant::now()),
                        }
                    }
                    debouncer.finish_rebuild(Instant::now());
                }
            }
        }
    }
}
