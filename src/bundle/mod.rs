//! Bundle graph.
//!
//! ```text
//! entries ──> documents ──┐
//!         └─> scripts ────┴─> Bundle { scripts ∪ documents' scripts }
//!                                  │ BuildHandle::rebuild()
//!                                  ▼
//!                             resolved_inputs (last metafile)
//! ```
//!
//! `resolved_inputs` is the only answer to "does file X affect bundle Y".
//! A bundle's handle is moved into a [`BundleJob`] for the duration of a
//! rebuild, so a bundle can never be rebuilt twice concurrently.

pub mod engine;
pub mod entry;


pub use entry::{DEFAULT_BUNDLE, Entry, EntryPatterns, collect_entries};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rayon::prelude::*;

use engine::{BuildError, BuildHandle, BuildOptions, Metafile, TransformEngine};

/// Identifies a unit of script building.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BundleKey {
    /// Named bundle aggregating entry scripts and documents' scripts.
    Shared(String),
    /// A standalone script, keyed by its id.
    Standalone(String),
}

impl BundleKey {
    pub fn label(&self) -> String {
        match self {
            Self::Shared(id) => format!("bundle {id}"),
            Self::Standalone(id) => id.clone(),
        }
    }
}

pub struct Bundle {
    pub hmr: bool,
    /// Script entries added verbatim.
    pub scripts: BTreeSet<String>,
    /// Indices of documents owned by this bundle.
    pub importers: Vec<usize>,
    pub resolved_inputs: BTreeSet<String>,
    pub last_metafile: Option<Metafile>,
    /// Last build failed; retried on the next change.
    pub failed: bool,
    handle: Option<Box<dyn BuildHandle>>,
    /// Script set the current handle was created for.
    built_scripts: BTreeSet<String>,
}

impl Bundle {
    fn new(hmr: bool) -> Self {
        Self {
            hmr,
            scripts: BTreeSet::new(),
            importers: Vec::new(),
            resolved_inputs: BTreeSet::new(),
            last_metafile: None,
            failed: false,
            handle: None,
            built_scripts: BTreeSet::new(),
        }
    }

    /// Whether the next build needs a fresh handle for `scripts`.
    pub fn needs_context(&self, scripts: &BTreeSet<String>) -> bool {
        self.handle.is_none() || &self.built_scripts != scripts
    }

    fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.dispose();
        }
    }
}

/// A bundle's handle checked out for one rebuild.
pub struct BundleJob {
    pub key: BundleKey,
    pub scripts: BTreeSet<String>,
    handle: Option<Box<dyn BuildHandle>>,
}

pub struct BundleOutcome {
    pub key: BundleKey,
    scripts: BTreeSet<String>,
    handle: Option<Box<dyn BuildHandle>>,
    result: Result<Metafile, BuildError>,
}

/// Engine options shared by every job of a pass.
#[derive(Debug, Clone, Copy)]
pub struct JobOptions {
    pub minify: bool,
    pub write: bool,
}

impl BundleJob {
    /// Build, creating a fresh handle when none was checked out.
    pub fn run(self, engine: &dyn TransformEngine, options: JobOptions) -> BundleOutcome {
        let Self { key, scripts, handle } = self;
        let handle = match handle {
            Some(handle) => Ok(handle),
            None => engine.context(BuildOptions {
                entry_points: scripts.iter().cloned().collect(),
                minify: options.minify,
                write: options.write,
                label: key.label(),
            }),
        };

        match handle {
            Ok(mut handle) => {
                let result = handle.rebuild().map(|r| r.metafile);
                BundleOutcome {
                    key,
                    scripts,
                    handle: Some(handle),
                    result,
                }
            }
            Err(e) => BundleOutcome {
                key,
                scripts,
                handle: None,
                result: Err(e),
            },
        }
    }
}

/// Run jobs in parallel on the rayon pool (production).
pub fn run_parallel(
    jobs: Vec<BundleJob>,
    engine: &dyn TransformEngine,
    options: JobOptions,
) -> Vec<BundleOutcome> {
    jobs.into_par_iter()
        .map(|job| job.run(engine, options))
        .collect()
}

/// Run jobs concurrently as blocking tasks and await them jointly (watch mode).
pub async fn run_concurrent(
    jobs: Vec<BundleJob>,
    engine: Arc<dyn TransformEngine>,
    options: JobOptions,
) -> Vec<BundleOutcome> {
    let mut set = tokio::task::JoinSet::new();
    for job in jobs {
        let engine = Arc::clone(&engine);
        set.spawn_blocking(move || job.run(engine.as_ref(), options));
    }

    let mut outcomes = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => crate::log!("bundle"; "build task failed: {}", e),
        }
    }
    outcomes.sort_by(|a, b| a.key.cmp(&b.key));
    outcomes
}

/// All bundles and standalone scripts of a build session.
#[derive(Default)]
pub struct BundleGraph {
    pub bundles: BTreeMap<String, Bundle>,
    pub standalone: BTreeMap<String, Bundle>,
}

impl BundleGraph {
    /// Add a script entry to its bundle, creating the bundle on first reference.
    pub fn add_script(&mut self, bundle: &str, id: &str, hmr: bool) {
        let bundle = self.bundle_mut(bundle, hmr);
        bundle.scripts.insert(id.to_string());
    }

    /// Register a document as an importer of its bundle.
    pub fn add_importer(&mut self, bundle: &str, document: usize, hmr: bool) {
        let bundle = self.bundle_mut(bundle, hmr);
        if !bundle.importers.contains(&document) {
            bundle.importers.push(document);
        }
    }

    pub fn add_standalone(&mut self, id: &str, hmr: bool) {
        let mut bundle = Bundle::new(hmr);
        bundle.scripts.insert(id.to_string());
        self.standalone.insert(id.to_string(), bundle);
    }

    /// Drop a deleted script entry. A standalone script loses its handle; a
    /// bundle left with neither scripts nor documents goes away.
    pub fn remove_script(&mut self, id: &str) {
        if let Some(mut bundle) = self.standalone.remove(id) {
            bundle.dispose();
        }
        self.bundles.retain(|_, bundle| {
            if !bundle.scripts.remove(id) {
                return true;
            }
            let keep = !bundle.scripts.is_empty() || !bundle.importers.is_empty();
            if !keep {
                bundle.dispose();
            }
            keep
        });
    }

    /// Get or create a bundle; `hmr` is AND-ed into an existing one.
    fn bundle_mut(&mut self, id: &str, hmr: bool) -> &mut Bundle {
        let bundle = self
            .bundles
            .entry(id.to_string())
            .or_insert_with(|| Bundle::new(hmr));
        bundle.hmr &= hmr;
        bundle
    }

    pub fn get(&self, key: &BundleKey) -> Option<&Bundle> {
        match key {
            BundleKey::Shared(id) => self.bundles.get(id),
            BundleKey::Standalone(id) => self.standalone.get(id),
        }
    }

    fn get_mut(&mut self, key: &BundleKey) -> Option<&mut Bundle> {
        match key {
            BundleKey::Shared(id) => self.bundles.get_mut(id),
            BundleKey::Standalone(id) => self.standalone.get_mut(id),
        }
    }

    /// Every key, shared bundles first.
    pub fn keys(&self) -> Vec<BundleKey> {
        self.bundles
            .keys()
            .cloned()
            .map(BundleKey::Shared)
            .chain(self.standalone.keys().cloned().map(BundleKey::Standalone))
            .collect()
    }

    /// Keys whose last build read any of `ids`, plus every failed one.
    pub fn affected_by(&self, ids: &BTreeSet<String>) -> Vec<BundleKey> {
        self.keys()
            .into_iter()
            .filter(|key| {
                self.get(key).is_some_and(|b| {
                    b.failed || !b.resolved_inputs.is_disjoint(ids)
                })
            })
            .collect()
    }

    /// Standalone scripts whose inputs include `id`.
    pub fn standalone_containing(&self, id: &str) -> Vec<String> {
        self.standalone
            .iter()
            .filter(|(_, b)| b.resolved_inputs.contains(id))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Check out a job per key. `scripts` gives each key's current script set;
    /// a handle built for a different set is disposed.
    pub fn take_jobs(
        &mut self,
        keys: &[BundleKey],
        scripts: impl Fn(&BundleKey, &Bundle) -> BTreeSet<String>,
    ) -> Vec<BundleJob> {
        let mut jobs = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bundle) = self.get_mut(key) else {
                continue;
            };
            let set = scripts(key, bundle);
            if bundle.needs_context(&set) {
                bundle.dispose();
            }
            jobs.push(BundleJob {
                key: key.clone(),
                handle: bundle.handle.take(),
                scripts: set,
            });
        }
        jobs
    }

    /// Return handles and record inputs. Errors are collected, not fatal.
    pub fn apply(&mut self, outcomes: Vec<BundleOutcome>) -> Vec<BuildError> {
        let mut errors = Vec::new();
        for outcome in outcomes {
            let Some(bundle) = self.get_mut(&outcome.key) else {
                if let Some(handle) = outcome.handle {
                    handle.dispose();
                }
                continue;
            };
            bundle.handle = outcome.handle;
            bundle.built_scripts = outcome.scripts;
            match outcome.result {
                Ok(metafile) => {
                    bundle.resolved_inputs = metafile.input_ids();
                    bundle.last_metafile = Some(metafile);
                    bundle.failed = false;
                }
                Err(e) => {
                    bundle.failed = true;
                    errors.push(e);
                }
            }
        }
        errors
    }

    /// Dispose every handle.
    pub fn dispose(&mut self) {
        for bundle in self.bundles.values_mut().chain(self.standalone.values_mut()) {
            bundle.dispose();
        }
    }
}
