//! Related-file watcher.
//!
//! Maps watched paths to the logical files that depend on them without an
//! import edge: data read at build time, env files behind a virtual module,
//! directories scanned by a plugin.
//!
//! ```text
//! files: data/site.json ─┬─> env:public
//!                        └─> src/index.html
//! dirs:  content/        ───> virtual:routes   (child added / removed)
//! ```
//!
//! A watched file fires on any change of that exact path. A watched
//! directory fires when a direct child is created or removed.

mod backend;

#[cfg(test)]
mod tests;

pub use backend::{NoopBackend, NotifyBackend, WatchBackend};

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::utils::path::lexical_normalize;

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

type ChangeCallback = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Mapping {
    files: FxHashMap<PathBuf, FxHashSet<String>>,
    dirs: FxHashMap<PathBuf, FxHashSet<String>>,
}

impl Mapping {
    fn is_watched(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.dirs.contains_key(path)
    }
}

/// Many-to-many mapping from watched paths to related logical files.
pub struct RelatedWatcher {
    mapping: Mutex<Mapping>,
    callbacks: RwLock<Vec<ChangeCallback>>,
    backend: Box<dyn WatchBackend>,
}

impl RelatedWatcher {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            mapping: Mutex::new(Mapping::default()),
            callbacks: RwLock::new(Vec::new()),
            backend,
        }
    }

    /// Watcher that never registers paths with a backend (production builds).
    pub fn detached() -> Self {
        Self::new(Box::new(NoopBackend))
    }

    /// Invalidate `related` whenever the file at `path` changes.
    pub fn watch_file(&self, path: &Path, related: &str) {
        self.add(path, related, false);
    }

    /// Invalidate `related` whenever a direct child of `path` is added or removed.
    pub fn watch_directory(&self, path: &Path, related: &str) {
        self.add(path, related, true);
    }

    fn add(&self, path: &Path, related: &str, dir: bool) {
        let path = lexical_normalize(path);
        let newly_watched = {
            let mut mapping = self.mapping.lock();
            let was_watched = mapping.is_watched(&path);
            let map = if dir {
                &mut mapping.dirs
            } else {
                &mut mapping.files
            };
            map.entry(path.clone()).or_default().insert(related.to_string());
            !was_watched
        };

        if newly_watched {
            crate::debug!("related"; "watch {} for {}", path.display(), related);
            self.backend.watch(&path);
        }
    }

    /// Remove `related` from every set; paths left without related files are unwatched.
    pub fn forget_related_file(&self, related: &str) {
        let emptied: Vec<PathBuf> = {
            let mut guard = self.mapping.lock();
            let mapping = &mut *guard;
            let mut candidates = Vec::new();
            for map in [&mut mapping.files, &mut mapping.dirs] {
                map.retain(|path, set| {
                    if set.remove(related) && set.is_empty() {
                        candidates.push(path.clone());
                        return false;
                    }
                    true
                });
            }
            candidates
                .into_iter()
                .filter(|path| !mapping.is_watched(path))
                .collect()
        };

        for path in emptied {
            crate::debug!("related"; "unwatch {}", path.display());
            self.backend.unwatch(&path);
        }
    }

    /// Subscribe to related-file changes. Called once per related file.
    pub fn on_change(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Report a filesystem change, returning the related files it affects.
    ///
    /// Callbacks fire once per related file, in discovery order.
    pub fn notify_change(&self, path: &Path, kind: ChangeKind) -> Vec<String> {
        let path = lexical_normalize(path);
        let related = {
            let mapping = self.mapping.lock();
            let mut seen: FxHashSet<String> = FxHashSet::default();
            let mut related = Vec::new();

            let mut collect = |set: Option<&FxHashSet<String>>| {
                let mut ids: Vec<String> = set.into_iter().flatten().cloned().collect();
                ids.sort();
                for id in ids {
                    if seen.insert(id.clone()) {
                        related.push(id);
                    }
                }
            };

            collect(mapping.files.get(&path));
            if kind != ChangeKind::Modified {
                collect(mapping.dirs.get(&path));
                if let Some(parent) = path.parent() {
                    collect(mapping.dirs.get(parent));
                }
            }
            related
        };

        if !related.is_empty() {
            let callbacks = self.callbacks.read();
            for id in &related {
                for callback in callbacks.iter() {
                    callback(id);
                }
            }
        }
        related
    }

    /// Paths currently registered, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mapping = self.mapping.lock();
        let mut paths: Vec<PathBuf> = mapping
            .files
            .keys()
            .chain(mapping.dirs.keys())
            .cloned()
            .collect::<FxHashSet<_>>()
            .into_iter()
            .collect();
        paths.sort();
        paths
    }
}
