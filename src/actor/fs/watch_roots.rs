use std::path::PathBuf;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::bundle::Entry;
use crate::config::WeftConfig;

/// Directories and files watched recursively for the whole run.
///
/// Source dir, assets dir and the config file, plus the parent directory of
/// every entry outside them. Roots inside the output dir are dropped.
pub fn collect_watch_roots(config: &WeftConfig, entries: &[Entry]) -> Vec<PathBuf> {
    let resolver = config.resolver();
    let mut roots = vec![resolver.src_dir().to_path_buf(), config.assets_dir()];
    if config.config_path.exists() {
        roots.push(config.config_path.clone());
    }
    for entry in entries {
        if let Some(parent) = entry.file.parent() {
            roots.push(parent.to_path_buf());
        }
    }

    dedupe_nested(&mut roots);
    roots.retain(|root| !resolver.is_output(root));
    roots
}

/// Drop roots already covered by another root.
fn dedupe_nested(roots: &mut Vec<PathBuf>) {
    roots.sort();
    roots.dedup();
    let snapshot = roots.clone();
    roots.retain(|root| {
        !snapshot
            .iter()
            .any(|other| other != root && root.starts_with(other))
    });
}

/// Watch-root consistency manager.
///
/// Attaches existing roots at startup and re-attaches roots that were
/// removed and recreated.
pub(super) struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    pub(super) fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    pub(super) fn attach_existing(&mut self, watcher: &mut RecommendedWatcher) -> notify::Result<()> {
        for path in &self.desired {
            if !path.exists() {
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }
        Ok(())
    }

    pub(super) fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }
}
