//! Actor message definitions.
//!
//! ```text
//! FsActor --Pass{changes, done}--> BuildActor
//!    ▲                                 │
//!    └────────────── done ─────────────┘
//! ```

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::related::ChangeKind;

/// Messages to the build actor.
#[derive(Debug)]
pub enum BuildMsg {
    /// Run one pass over a debounced batch. `done` fires once the pass has
    /// settled, which ends the watcher's `Rebuilding` state.
    Pass {
        changes: Vec<(PathBuf, ChangeKind)>,
        done: oneshot::Sender<()>,
    },
    Shutdown,
}
