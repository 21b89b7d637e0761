//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! src = "src"                     # Source root, outputs mirror paths beneath it
//! out = "dist"                    # Output directory
//! assets = "public"               # Served as-is in dev, copied in production
//! minify = true                   # Minify output (production only)
//! critical = false                # Inline critical CSS (production only)
//! entries = ["src/**/*.html"]     # Entry glob patterns
//! mode = "development"            # Env-file suffix in watch mode
//!
//! [[build.entry]]
//! file = "src/worker.js"
//! bundle = "worker"
//! hmr = false
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Source root directory.
    pub src: PathBuf,

    /// Output directory.
    pub out: PathBuf,

    /// Static assets directory.
    pub assets: PathBuf,

    /// Minify scripts, styles and HTML.
    pub minify: bool,

    /// Inline the critical subset of each document's CSS.
    pub critical: bool,

    /// Glob patterns selecting entry files, relative to the root.
    pub entries: Vec<String>,

    /// Env-file suffix used in watch mode.
    pub mode: String,

    /// Explicit entries.
    pub entry: Vec<EntryConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: "src".into(),
            out: "dist".into(),
            assets: "public".into(),
            minify: false,
            critical: false,
            entries: vec!["src/**/*.html".into()],
            mode: "development".into(),
            entry: Vec::new(),
        }
    }
}

/// `[[build.entry]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    /// Entry file, relative to the root.
    pub file: PathBuf,

    /// Bundle id (default: `"default"`).
    #[serde(default)]
    pub bundle: Option<String>,

    /// Hot module reload for this entry.
    #[serde(default = "default_true")]
    pub hmr: bool,

    /// Build the script alone instead of adding it to a bundle.
    #[serde(default)]
    pub standalone: bool,
}

const fn default_true() -> bool {
    true
}
