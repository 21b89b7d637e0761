//! Virtual file store.
//!
//! Plugins register in-memory modules under namespaced ids (`env:public`,
//! `weft-eval:3`). They resolve through the same pipeline as real files and
//! take part in the related-file graph: a virtual file that was derived from
//! real files is invalidated when those files change.

mod file;


pub use file::{Handler, Loader, Producer, Request, VirtualData, VirtualFile};

use std::sync::Arc;

use dashmap::DashMap;
use file::Source;

use crate::related::RelatedWatcher;

/// Concurrent map of virtual files, shared with the HTTP handlers.
pub struct VirtualFileStore {
    files: DashMap<String, Arc<VirtualFile>>,
    related: Arc<RelatedWatcher>,
}

impl VirtualFileStore {
    /// Create a store whose Lazy files are invalidated by related-file changes.
    pub fn new(related: Arc<RelatedWatcher>) -> Arc<Self> {
        let store = Arc::new(Self {
            files: DashMap::new(),
            related: Arc::clone(&related),
        });

        let weak = Arc::downgrade(&store);
        related.on_change(move |id| {
            if let Some(store) = weak.upgrade() {
                store.invalidate(id);
            }
        });
        store
    }

    /// Register a file, replacing (and retracting) any previous one.
    pub fn set(&self, id: &str, file: VirtualFile) {
        self.unset(id);
        if let Source::Static(data) = &file.source {
            self.register_watches(id, data);
        }
        crate::debug!("vfs"; "set {}", id);
        self.files.insert(id.to_string(), Arc::new(file));
    }

    /// Remove a file. Returns whether it existed.
    pub fn unset(&self, id: &str) -> bool {
        let existed = self.files.remove(id).is_some();
        if existed {
            self.related.forget_related_file(id);
        }
        existed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.files.contains_key(id)
    }

    /// Drop the cached result of a Lazy file so the next resolve recomputes it.
    pub fn invalidate(&self, id: &str) {
        let Some(file) = self.get(id) else {
            return;
        };
        if file.reset() {
            crate::debug!("vfs"; "invalidated {}", id);
        }
    }

    /// Resolve a file's contents. Errors are logged and read as not found.
    ///
    /// `request` is only consulted by per-request handlers; without one a
    /// request for the id's own URI is synthesized.
    pub fn resolve(&self, id: &str, request: Option<&Request>) -> Option<Arc<VirtualData>> {
        let file = self.get(id)?;
        match &file.source {
            Source::Static(data) => Some(Arc::clone(data)),
            Source::Lazy { producer, cell } => {
                let cell = Arc::clone(&cell.lock());
                cell.get_or_init(|| match producer() {
                    Ok(data) => {
                        let data = Arc::new(data);
                        self.related.forget_related_file(id);
                        self.register_watches(id, &data);
                        Some(data)
                    }
                    Err(e) => {
                        crate::log!("vfs"; "failed to load {}: {:#}", id, e);
                        None
                    }
                })
                .clone()
            }
            Source::Request(handler) => {
                let synthesized;
                let request = match request {
                    Some(request) => request,
                    None => {
                        synthesized = Request::parse(&format!("/{id}"));
                        &synthesized
                    }
                };
                match handler(request) {
                    Ok(data) => data.map(Arc::new),
                    Err(e) => {
                        crate::log!("vfs"; "request for {} failed: {:#}", id, e);
                        None
                    }
                }
            }
        }
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.files.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn get(&self, id: &str) -> Option<Arc<VirtualFile>> {
        self.files.get(id).map(|entry| Arc::clone(entry.value()))
    }

    fn register_watches(&self, id: &str, data: &VirtualData) {
        for path in &data.watch_files {
            self.related.watch_file(path, id);
        }
        for path in &data.watch_dirs {
            self.related.watch_directory(path, id);
        }
    }
}
