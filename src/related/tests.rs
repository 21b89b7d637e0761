//! Tests for the related-file watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::*;

/// Records every backend call.
#[derive(Clone, Default)]
struct FakeBackend {
    calls: Arc<Mutex<Vec<(&'static str, PathBuf)>>>,
}

impl WatchBackend for FakeBackend {
    fn watch(&self, path: &Path) {
        self.calls.lock().push(("watch", path.to_path_buf()));
    }

    fn unwatch(&self, path: &Path) {
        self.calls.lock().push(("unwatch", path.to_path_buf()));
    }
}

fn watcher() -> (RelatedWatcher, FakeBackend) {
    let backend = FakeBackend::default();
    (RelatedWatcher::new(Box::new(backend.clone())), backend)
}

fn record(watcher: &RelatedWatcher) -> Arc<Mutex<Vec<String>>> {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    watcher.on_change(move |id| sink.lock().push(id.to_string()));
    fired
}

// =============================================================================
// Registration
// =============================================================================

#[test]
fn test_watch_file_registers_once() {
    let (watcher, backend) = watcher();
    watcher.watch_file(Path::new("/p/data.json"), "a");
    watcher.watch_file(Path::new("/p/data.json"), "b");
    watcher.watch_file(Path::new("/p/data.json"), "a");

    let calls = backend.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], ("watch", PathBuf::from("/p/data.json")));
}

#[test]
fn test_paths_are_normalized() {
    let (watcher, _) = watcher();
    watcher.watch_file(Path::new("/p/x/../data.json"), "a");
    assert_eq!(watcher.watched_paths(), vec![PathBuf::from("/p/data.json")]);
}

// =============================================================================
// Notification
// =============================================================================

#[test]
fn test_file_change_fires_exactly_once() {
    let (watcher, _) = watcher();
    let fired = record(&watcher);
    watcher.watch_file(Path::new("/p/a.json"), "R");

    let related = watcher.notify_change(Path::new("/p/a.json"), ChangeKind::Modified);

    assert_eq!(related, vec!["R".to_string()]);
    assert_eq!(*fired.lock(), vec!["R".to_string()]);
}

#[test]
fn test_directory_fires_on_child_add_and_remove() {
    let (watcher, _) = watcher();
    let fired = record(&watcher);
    watcher.watch_directory(Path::new("/p/content"), "routes");

    watcher.notify_change(Path::new("/p/content/new.md"), ChangeKind::Created);
    watcher.notify_change(Path::new("/p/content/new.md"), ChangeKind::Modified);
    watcher.notify_change(Path::new("/p/content/old.md"), ChangeKind::Removed);

    assert_eq!(*fired.lock(), vec!["routes".to_string(), "routes".to_string()]);
}

#[test]
fn test_duplicates_fire_once_per_notification() {
    let (watcher, _) = watcher();
    let fired = record(&watcher);
    watcher.watch_directory(Path::new("/p/content"), "R");
    watcher.watch_file(Path::new("/p/content/a.md"), "R");

    let related = watcher.notify_change(Path::new("/p/content/a.md"), ChangeKind::Created);

    assert_eq!(related, vec!["R".to_string()]);
    assert_eq!(fired.lock().len(), 1);
}

#[test]
fn test_unrelated_path_fires_nothing() {
    let (watcher, _) = watcher();
    let fired = record(&watcher);
    watcher.watch_file(Path::new("/p/a.json"), "R");

    assert!(watcher.notify_change(Path::new("/p/b.json"), ChangeKind::Modified).is_empty());
    assert!(fired.lock().is_empty());
}

// =============================================================================
// Forget
// =============================================================================

#[test]
fn test_forget_unwatches_and_silences() {
    let (watcher, backend) = watcher();
    let fired = record(&watcher);
    watcher.watch_file(Path::new("/p/a.json"), "R");

    watcher.forget_related_file("R");

    assert!(watcher.watched_paths().is_empty());
    assert!(watcher.notify_change(Path::new("/p/a.json"), ChangeKind::Modified).is_empty());
    assert!(fired.lock().is_empty());
    assert_eq!(
        backend.calls.lock().last(),
        Some(&("unwatch", PathBuf::from("/p/a.json")))
    );
}

#[test]
fn test_forget_keeps_paths_with_other_related_files() {
    let (watcher, backend) = watcher();
    watcher.watch_file(Path::new("/p/a.json"), "R");
    watcher.watch_file(Path::new("/p/a.json"), "S");

    watcher.forget_related_file("R");

    assert_eq!(watcher.watched_paths(), vec![PathBuf::from("/p/a.json")]);
    assert!(backend.calls.lock().iter().all(|(op, _)| *op == "watch"));
    assert_eq!(
        watcher.notify_change(Path::new("/p/a.json"), ChangeKind::Modified),
        vec!["S".to_string()]
    );
}

#[test]
fn test_path_watched_as_file_and_dir_stays_until_both_empty() {
    let (watcher, backend) = watcher();
    watcher.watch_file(Path::new("/p/content"), "R");
    watcher.watch_directory(Path::new("/p/content"), "S");

    watcher.forget_related_file("R");
    assert_eq!(watcher.watched_paths(), vec![PathBuf::from("/p/content")]);

    watcher.forget_related_file("S");
    assert!(watcher.watched_paths().is_empty());
    let unwatches = backend
        .calls
        .lock()
        .iter()
        .filter(|(op, _)| *op == "unwatch")
        .count();
    assert_eq!(unwatches, 1);
}
