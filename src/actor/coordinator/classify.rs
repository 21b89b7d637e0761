//! Sorting a debounced batch by what it touches.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::related::ChangeKind;
use crate::session::{BuildContext, BuildSession};

/// Ids of a batch, by the work they cause.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Document ids.
    pub pages: BTreeSet<String>,
    /// Standalone scripts whose inputs include a changed id.
    pub scripts: BTreeSet<String>,
    /// Stylesheets and ids known to the registry, a bundle or a stylesheet.
    pub modules: BTreeSet<String>,
    /// Ids whose file was deleted.
    pub removed: BTreeSet<String>,
    /// Every changed id, related ids included.
    pub all: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn has_css(&self) -> bool {
        self.all.iter().any(|id| is_css(id))
    }
}

pub fn is_css(id: &str) -> bool {
    id.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("css"))
}

/// Classify a batch against the session.
///
/// Every path is also reported to the related-file watcher; the ids it
/// returns are classified like the path's own id, and virtual ones get
/// invalidated through the store's callback.
pub fn classify(
    changes: &[(PathBuf, ChangeKind)],
    session: &BuildSession,
    ctx: &BuildContext,
) -> ChangeSet {
    let mut set = ChangeSet::default();

    for (path, kind) in changes {
        if ctx.resolver.is_output(path) {
            continue;
        }
        let id = ctx.resolver.path_to_id(path);
        if *kind == ChangeKind::Removed {
            set.removed.insert(id.clone());
        }

        let related = ctx.related.notify_change(path, *kind);
        for id in std::iter::once(id).chain(related) {
            if session.is_document(&id) {
                set.pages.insert(id.clone());
            }
            set.scripts.extend(session.graph.standalone_containing(&id));
            if is_css(&id) || ctx.registry.contains(&id) || session.is_input(&id) {
                set.modules.insert(id.clone());
            }
            set.all.insert(id);
        }
    }

    set
}
