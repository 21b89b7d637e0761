use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::related::ChangeKind;
use crate::utils::path::normalize_path;

pub(super) const DEBOUNCE_MS: u64 = 200;

/// Sleep used while no flush is scheduled.
const IDLE_SLEEP: Duration = Duration::from_secs(86400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    Idle,
    /// Changes are waiting; flush once `deadline` passes without new events.
    Pending { deadline: Instant },
    /// A pass is running; new changes wait for the next cycle.
    Rebuilding,
}

/// Trailing debouncer with event merging.
///
/// ```text
/// Idle ──event──> Pending ──deadline──> Rebuilding ──finish──> Idle
///                  ▲   │ event: deadline moves                    │
///                  │   └──────────────────┘                       │
///                  └─────────────── finish with queued changes ───┘
/// ```
pub(super) struct Debouncer {
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) state: State,
    /// Directories whose events never reach a pass (the build output).
    ignored: Vec<PathBuf>,
}

impl Debouncer {
    pub(super) fn new(ignored: Vec<PathBuf>) -> Self {
        Self {
            changes: FxHashMap::default(),
            state: State::Idle,
            ignored,
        }
    }

    /// Add a notify event, applying merge rules:
    /// - Removed + Created/Modified → the new kind (file was restored)
    /// - Modified + Removed → Removed
    /// - Created + Removed → discarded
    /// - otherwise the first event wins
    pub(super) fn add_event(&mut self, event: &notify::Event, now: Instant) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes would retrigger on our own writes.
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        let mut touched = false;
        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            let path = normalize_path(path);
            if self.ignored.iter().any(|dir| path.starts_with(dir)) {
                continue;
            }
            self.merge(path, kind);
            touched = true;
        }

        if touched && self.state != State::Rebuilding {
            self.state = State::Pending {
                deadline: now + Duration::from_millis(DEBOUNCE_MS),
            };
        }
    }

    fn merge(&mut self, path: PathBuf, kind: ChangeKind) {
        let Some(&existing) = self.changes.get(&path) else {
            crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.changes.insert(path, kind);
            return;
        };

        match (existing, kind) {
            (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                crate::debug!("watch"; "restore removed->{}: {}", kind.label(), path.display());
                self.changes.insert(path, kind);
            }
            (ChangeKind::Modified, ChangeKind::Removed) => {
                crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                self.changes.insert(path, ChangeKind::Removed);
            }
            (ChangeKind::Created, ChangeKind::Removed) => {
                crate::debug!("watch"; "discard created+removed: {}", path.display());
                self.changes.remove(&path);
            }
            _ => {}
        }
    }

    /// Take the batch once the deadline has passed and enter `Rebuilding`.
    ///
    /// A window whose events cancelled out returns to `Idle`.
    pub(super) fn take_if_ready(&mut self, now: Instant) -> Option<Vec<(PathBuf, ChangeKind)>> {
        let State::Pending { deadline } = self.state else {
            return None;
        };
        if now < deadline {
            return None;
        }
        if self.changes.is_empty() {
            self.state = State::Idle;
            return None;
        }

        let mut batch: Vec<_> = self.changes.drain().collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        self.state = State::Rebuilding;
        Some(batch)
    }

    /// Leave `Rebuilding`; changes queued meanwhile start a fresh window.
    pub(super) fn finish_rebuild(&mut self, now: Instant) {
        self.state = if self.changes.is_empty() {
            State::Idle
        } else {
            State::Pending {
                deadline: now + Duration::from_millis(DEBOUNCE_MS),
            }
        };
    }

    /// Time until the next possible flush.
    pub(super) fn sleep_duration(&self, now: Instant) -> Duration {
        match self.state {
            State::Pending { deadline } => deadline
                .saturating_duration_since(now)
                .max(Duration::from_millis(1)),
            State::Idle | State::Rebuilding => IDLE_SLEEP,
        }
    }
}

/// Editor swap, backup and lock files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
        || name.starts_with(".~")
        || name == "4913"
}
