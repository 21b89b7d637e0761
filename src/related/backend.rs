//! Backends that turn related-file registrations into OS watches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;

/// Registers and releases non-recursive watches.
pub trait WatchBackend: Send + Sync {
    fn watch(&self, path: &Path);
    fn unwatch(&self, path: &Path);
}

/// Backend for one-shot builds.
pub struct NoopBackend;

impl WatchBackend for NoopBackend {
    fn watch(&self, _path: &Path) {}
    fn unwatch(&self, _path: &Path) {}
}

/// Shares the orchestrator's watcher so related paths feed the same event stream.
///
/// Paths under `covered` are already watched recursively and are skipped.
pub struct NotifyBackend {
    watcher: Arc<Mutex<RecommendedWatcher>>,
    covered: Vec<PathBuf>,
}

impl NotifyBackend {
    pub fn new(watcher: Arc<Mutex<RecommendedWatcher>>, covered: Vec<PathBuf>) -> Self {
        Self { watcher, covered }
    }

    fn is_covered(&self, path: &Path) -> bool {
        self.covered.iter().any(|root| path.starts_with(root))
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, path: &Path) {
        if self.is_covered(path) {
            return;
        }
        if let Err(e) = self.watcher.lock().watch(path, RecursiveMode::NonRecursive) {
            crate::debug!("related"; "cannot watch {}: {}", path.display(), e);
        }
    }

    fn unwatch(&self, path: &Path) {
        if self.is_covered(path) {
            return;
        }
        let _ = self.watcher.lock().unwatch(path);
    }
}
