//! Stylesheet bundling with lightningcss.
//!
//! `@import`s are inlined by the lightningcss bundler. Every file it reads is
//! recorded so the orchestrator can map a changed partial back to the
//! stylesheets that include it.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::bundler::{Bundler, FileProvider, ResolveResult, SourceProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use parking_lot::Mutex;

use crate::bundle::engine::BuildError;
use crate::core::Resolver;

/// Reads through a [`FileProvider`] and remembers every path read.
struct RecordingProvider {
    inner: FileProvider,
    read: Mutex<BTreeSet<PathBuf>>,
}

impl RecordingProvider {
    fn new() -> Self {
        Self {
            inner: FileProvider::new(),
            read: Mutex::new(BTreeSet::new()),
        }
    }

    fn into_read(self) -> BTreeSet<PathBuf> {
        self.read.into_inner()
    }
}

impl SourceProvider for RecordingProvider {
    type Error = std::io::Error;

    fn read<'a>(&'a self, file: &Path) -> Result<&'a str, Self::Error> {
        self.read.lock().insert(file.to_path_buf());
        self.inner.read(file)
    }

    fn resolve(&self, specifier: &str, originating_file: &Path) -> Result<ResolveResult, Self::Error> {
        self.inner.resolve(specifier, originating_file)
    }
}

/// A bundled stylesheet.
#[derive(Debug)]
pub struct BuiltStyle {
    pub code: String,
    /// Ids of every file the bundle read, entry included.
    pub inputs: BTreeSet<String>,
}

/// Bundle the stylesheet `id`, inlining its imports.
pub fn bundle_style(resolver: &Resolver, id: &str, minify: bool) -> Result<BuiltStyle, BuildError> {
    let path = resolver
        .id_to_path(id)
        .ok_or_else(|| BuildError::new(id, "virtual stylesheets cannot be bundled"))?;

    let provider = RecordingProvider::new();
    let code = {
        let mut bundler = Bundler::new(&provider, None, ParserOptions::default());
        let mut sheet = bundler
            .bundle(&path)
            .map_err(|e| BuildError::new(id, e.to_string()))?;
        if minify {
            sheet
                .minify(MinifyOptions::default())
                .map_err(|e| BuildError::new(id, e.to_string()))?;
        }
        sheet
            .to_css(PrinterOptions {
                minify,
                ..PrinterOptions::default()
            })
            .map_err(|e| BuildError::new(id, e.to_string()))?
            .code
    };

    let inputs = provider
        .into_read()
        .iter()
        .map(|p| resolver.path_to_id(p))
        .collect();
    Ok(BuiltStyle { code, inputs })
}

/// Bundle and write a stylesheet to its output path.
pub fn build_style(resolver: &Resolver, id: &str, minify: bool) -> Result<BuiltStyle, BuildError> {
    let style = bundle_style(resolver, id, minify)?;
    let out = resolver.output_path(id);
    write_output(&out, style.code.as_bytes()).map_err(|e| BuildError::new(id, e.to_string()))?;
    Ok(style)
}

pub(crate) fn write_output(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/css")).unwrap();
        let resolver = Resolver::new(dir.path(), Path::new("src"), Path::new("dist"));
        (dir, resolver)
    }

    #[test]
    fn test_imports_are_inlined_and_recorded() {
        let (dir, resolver) = setup();
        fs::write(
            dir.path().join("src/style.css"),
            "@import './css/base.css';\n.card { color: red; }\n",
        )
        .unwrap();
        fs::write(dir.path().join("src/css/base.css"), "body { margin: 0; }\n").unwrap();

        let style = build_style(&resolver, "src/style.css", false).unwrap();
        assert!(style.code.contains("margin: 0"));
        assert!(style.code.contains(".card"));
        assert_eq!(
            style.inputs,
            BTreeSet::from(["src/css/base.css".to_string(), "src/style.css".to_string()])
        );
        let written = fs::read_to_string(dir.path().join("dist/style.css")).unwrap();
        assert_eq!(written, style.code);
    }

    #[test]
    fn test_minified_output() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("src/a.css"), ".a {\n  color: #ff0000;\n}\n").unwrap();
        let style = bundle_style(&resolver, "src/a.css", true).unwrap();
        assert_eq!(style.code.trim(), ".a{color:red}");
    }

    #[test]
    fn test_missing_stylesheet_fails() {
        let (_dir, resolver) = setup();
        let err = bundle_style(&resolver, "src/missing.css", false).unwrap_err();
        assert_eq!(err.path, "src/missing.css");
    }
}
