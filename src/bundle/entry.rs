//! Build entries.
//!
//! Entries come from `[build] entries` glob patterns, `[[build.entry]]`
//! tables and plugins. HTML entries become documents; script entries join
//! their bundle or build alone when standalone.

use std::path::{Path, PathBuf};

use anyhow::Result;
use jwalk::WalkDir;
use rustc_hash::FxHashSet;

use crate::config::WeftConfig;
use crate::utils::glob::Glob;
use crate::utils::path::lexical_normalize;

/// Bundle id used when an entry names none.
pub const DEFAULT_BUNDLE: &str = "default";

/// Directory names never searched for entries.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Absolute path.
    pub file: PathBuf,
    pub bundle: Option<String>,
    pub hmr: bool,
    pub standalone: bool,
}

impl Entry {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            bundle: None,
            hmr: true,
            standalone: false,
        }
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    pub fn with_hmr(mut self, hmr: bool) -> Self {
        self.hmr = hmr;
        self
    }

    pub fn standalone(mut self) -> Self {
        self.standalone = true;
        self
    }

    pub fn bundle_id(&self) -> &str {
        self.bundle.as_deref().unwrap_or(DEFAULT_BUNDLE)
    }

    pub fn is_html(&self) -> bool {
        is_html(&self.file)
    }
}

pub fn is_html(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("html" | "htm")
    )
}

/// Compiled `[build] entries` patterns.
#[derive(Debug, Clone, Default)]
pub struct EntryPatterns {
    globs: Vec<Glob>,
}

impl EntryPatterns {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let globs = patterns
            .iter()
            .map(|p| Glob::new(p))
            .collect::<Result<_, _>>()?;
        Ok(Self { globs })
    }

    /// Whether a root-relative id matches any pattern.
    pub fn is_match(&self, id: &str) -> bool {
        self.globs.iter().any(|g| g.is_match(id))
    }
}

/// Collect entries from the config.
///
/// Explicit `[[build.entry]]` tables win over pattern matches for the same
/// file. The output directory is never searched.
pub fn collect_entries(config: &WeftConfig) -> Result<Vec<Entry>> {
    let resolver = config.resolver();
    let mut entries: Vec<Entry> = config
        .build
        .entry
        .iter()
        .map(|e| {
            let mut entry = Entry::new(config.root_join(&e.file)).with_hmr(e.hmr);
            if let Some(bundle) = &e.bundle {
                entry = entry.with_bundle(bundle.as_str());
            }
            if e.standalone {
                entry = entry.standalone();
            }
            entry
        })
        .collect();

    let patterns = EntryPatterns::new(&config.build.entries)?;
    let mut seen: FxHashSet<PathBuf> = entries.iter().map(|e| e.file.clone()).collect();

    let out_dir = resolver.out_dir().to_path_buf();
    let mut matched: Vec<PathBuf> = WalkDir::new(config.get_root())
        .skip_hidden(true)
        .process_read_dir(move |_, _, _, children| {
            children.retain(|child| {
                child.as_ref().map_or(true, |e| {
                    let name = e.file_name().to_string_lossy();
                    !(e.file_type().is_dir()
                        && (SKIPPED_DIRS.contains(&name.as_ref()) || e.path() == out_dir))
                })
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| lexical_normalize(&e.path()))
        .filter(|path| patterns.is_match(&resolver.path_to_id(path)))
        .collect();
    matched.sort();

    for file in matched {
        if seen.insert(file.clone()) {
            entries.push(Entry::new(file));
        }
    }
    Ok(entries)
}
