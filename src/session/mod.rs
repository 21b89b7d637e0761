//! Build session.
//!
//! The session owns every document and bundle of a run. Production builds
//! it once and disposes it; in watch mode the orchestrator is its only
//! owner and mutates it pass by pass.
//!
//! ```text
//! entries ─┬─ html ──> Document ──(importer of)──┐
//!          └─ js ────> script / standalone ──────┴─> BundleGraph
//! ```

mod context;


pub use context::BuildContext;

use std::collections::BTreeSet;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::bundle::engine::BuildError;
use crate::bundle::{BundleGraph, BundleJob, BundleKey, BundleOutcome, Entry, run_parallel};
use crate::core::Resolver;
use crate::document::Document;

pub struct BuildSession {
    pub documents: Vec<Document>,
    pub graph: BundleGraph,
}

impl BuildSession {
    /// Sort entries into documents, bundled scripts and standalone scripts.
    /// Repeated files keep their first entry.
    pub fn new(entries: &[Entry], resolver: &Resolver) -> Self {
        let mut documents = Vec::new();
        let mut graph = BundleGraph::default();
        let mut seen = FxHashSet::default();

        for entry in entries {
            if !seen.insert(entry.file.clone()) {
                continue;
            }
            if entry.is_html() {
                graph.add_importer(entry.bundle_id(), documents.len(), entry.hmr);
                documents.push(Document::new(entry, resolver));
                continue;
            }
            let id = resolver.path_to_id(&entry.file);
            if entry.standalone {
                graph.add_standalone(&id, entry.hmr);
            } else {
                graph.add_script(entry.bundle_id(), &id, entry.hmr);
            }
        }

        Self { documents, graph }
    }

    /// Render every document, then build every bundle in parallel.
    pub fn build_all(&mut self, ctx: &BuildContext) -> Vec<BuildError> {
        let mut errors = self.render(ctx, |_| true);
        let keys = self.graph.keys();
        let jobs = self.take_jobs(&keys);
        let outcomes = run_parallel(jobs, ctx.engine.as_ref(), ctx.job_options());
        errors.extend(self.apply(ctx, outcomes));
        errors
    }

    /// Re-render the documents with the given ids.
    pub fn render_pages(&mut self, ctx: &BuildContext, ids: &BTreeSet<String>) -> Vec<BuildError> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.render(ctx, |doc| ids.contains(&doc.id))
    }

    fn render(&mut self, ctx: &BuildContext, filter: impl Fn(&Document) -> bool + Sync) -> Vec<BuildError> {
        let render_ctx = ctx.render_context();
        self.documents
            .par_iter_mut()
            .filter(|doc| filter(doc))
            .flat_map_iter(|doc| doc.render(&render_ctx))
            .collect()
    }

    /// Rebuild every stylesheet of every document.
    pub fn rebuild_styles(&mut self, ctx: &BuildContext) -> Vec<BuildError> {
        let minify = ctx.mode.minify;
        self.documents
            .par_iter_mut()
            .flat_map_iter(|doc| doc.rebuild_styles(&ctx.resolver, minify))
            .collect()
    }

    /// Check out jobs with each bundle's current script set.
    pub fn take_jobs(&mut self, keys: &[BundleKey]) -> Vec<BundleJob> {
        let documents = &self.documents;
        self.graph
            .take_jobs(keys, |key, bundle| scripts_of(documents, key, &bundle.scripts, &bundle.importers))
    }

    /// Return handles to the graph and publish fresh metafiles to the
    /// module registry.
    pub fn apply(&mut self, ctx: &BuildContext, outcomes: Vec<BundleOutcome>) -> Vec<BuildError> {
        let keys: Vec<BundleKey> = outcomes.iter().map(|o| o.key.clone()).collect();
        let errors = self.graph.apply(outcomes);
        if ctx.mode.watch {
            for key in &keys {
                let Some(bundle) = self.graph.get(key) else {
                    continue;
                };
                if let (false, Some(metafile)) = (bundle.failed, &bundle.last_metafile) {
                    ctx.registry.update(&key.label(), metafile, &ctx.resolver);
                }
            }
        }
        errors
    }

    /// Bundles of the given documents whose script set no longer matches
    /// the one their handle was built for.
    pub fn stale_bundles(&self, pages: &BTreeSet<String>) -> Vec<BundleKey> {
        let mut keys = Vec::new();
        for doc in self.documents.iter().filter(|d| pages.contains(&d.id)) {
            let key = BundleKey::Shared(doc.bundle.clone());
            let Some(bundle) = self.graph.get(&key) else {
                continue;
            };
            let scripts = scripts_of(&self.documents, &key, &bundle.scripts, &bundle.importers);
            if bundle.needs_context(&scripts) && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn is_document(&self, id: &str) -> bool {
        self.document(id).is_some()
    }

    /// Whether any bundle or stylesheet read `id` on its last build.
    pub fn is_input(&self, id: &str) -> bool {
        self.graph
            .keys()
            .iter()
            .filter_map(|key| self.graph.get(key))
            .any(|b| b.resolved_inputs.contains(id))
            || self.documents.iter().any(|d| d.style_inputs().any(|i| i == id))
    }

    /// Inputs of HMR-disabled bundles, including the stylesheets of the
    /// documents they own.
    pub fn hmr_disabled_inputs(&self) -> BTreeSet<String> {
        let mut inputs = BTreeSet::new();
        for bundle in self.graph.bundles.values().filter(|b| !b.hmr) {
            inputs.extend(bundle.resolved_inputs.iter().cloned());
            for &index in &bundle.importers {
                if let Some(doc) = self.documents.get(index) {
                    inputs.extend(doc.style_inputs().cloned());
                }
            }
        }
        for bundle in self.graph.standalone.values().filter(|b| !b.hmr) {
            inputs.extend(bundle.resolved_inputs.iter().cloned());
        }
        inputs
    }

    /// Every file id a build read, for watching files outside the roots.
    pub fn input_ids(&self) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = self
            .graph
            .keys()
            .iter()
            .filter_map(|key| self.graph.get(key))
            .flat_map(|b| b.resolved_inputs.iter().cloned())
            .collect();
        for doc in &self.documents {
            ids.insert(doc.id.clone());
            ids.extend(doc.style_inputs().cloned());
        }
        ids
    }

    /// Number of stylesheets across all documents.
    pub fn style_count(&self) -> usize {
        self.documents.iter().map(|d| d.styles.len()).sum()
    }

    pub fn bundle_count(&self) -> usize {
        self.graph.bundles.len() + self.graph.standalone.len()
    }

    /// Dispose every build handle.
    pub fn dispose(&mut self) {
        self.graph.dispose();
    }
}

/// Scripts a bundle builds: its own entries plus those its documents link.
fn scripts_of(
    documents: &[Document],
    key: &BundleKey,
    scripts: &BTreeSet<String>,
    importers: &[usize],
) -> BTreeSet<String> {
    let mut set = scripts.clone();
    if let BundleKey::Shared(_) = key {
        for doc in importers.iter().filter_map(|&i| documents.get(i)) {
            set.extend(doc.script_ids());
        }
    }
    set
}
