//! Transform engine contract.
//!
//! The bundle graph talks to the engine only through these traits:
//!
//! ```text
//! TransformEngine::context(BuildOptions) ──> Box<dyn BuildHandle>
//!                                              │ rebuild()
//!                                              ▼
//!                                  BuildResult { metafile, output_files }
//! ```
//!
//! A handle keeps whatever incremental state it likes between rebuilds.
//! Metafile maps are ordered so an unchanged rebuild reports an identical
//! input set.

mod error;
mod module;
mod resolve;
mod scan;

pub use error::{BuildError, ResolveError};
pub use module::ModuleEngine;
pub use resolve::Resolved;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::vfs::Loader;

/// What a handle builds.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Entry module ids.
    pub entry_points: Vec<String>,
    pub minify: bool,
    /// Write outputs to disk on every rebuild.
    pub write: bool,
    /// Name used in log lines.
    pub label: String,
}

/// What the engine learned about one input module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputMeta {
    /// Ids of the modules this one imports.
    pub imports: BTreeSet<String>,
    pub watch_files: BTreeSet<PathBuf>,
    pub watch_dirs: BTreeSet<PathBuf>,
    /// `export name → (owner id, key in owner)` for `export { key as name } from`.
    pub reexports: BTreeMap<String, (String, String)>,
}

/// One emitted file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMeta {
    pub inputs: BTreeSet<String>,
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metafile {
    pub inputs: BTreeMap<String, InputMeta>,
    pub outputs: BTreeMap<PathBuf, OutputMeta>,
}

impl Metafile {
    /// Ids of every input module.
    pub fn input_ids(&self) -> BTreeSet<String> {
        self.inputs.keys().cloned().collect()
    }
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    pub metafile: Metafile,
    pub output_files: Vec<OutputFile>,
}

/// An incremental build of a fixed entry set.
pub trait BuildHandle: Send {
    fn rebuild(&mut self) -> Result<BuildResult, BuildError>;

    /// Release incremental state.
    fn dispose(self: Box<Self>) {}
}

pub trait TransformEngine: Send + Sync {
    fn context(&self, options: BuildOptions) -> Result<Box<dyn BuildHandle>, BuildError>;

    fn resolve(&self, specifier: &str, importer: &str) -> Result<Resolved, ResolveError>;
}

/// Source-to-source transform applied to every module of one loader.
pub trait TransformHook: Send + Sync {
    fn loader(&self) -> Loader;

    /// Return `None` to leave the code unchanged.
    fn transform(&self, id: &str, code: &str) -> anyhow::Result<Option<String>>;
}
