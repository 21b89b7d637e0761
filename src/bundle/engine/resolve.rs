//! Import specifier resolution.
//!
//! | Specifier            | Result                                   |
//! |----------------------|------------------------------------------|
//! | `./x`, `../x`        | file relative to the importer, extended  |
//! | `/x`                 | file relative to the project root        |
//! | `ns:payload`         | virtual module if registered, else external |
//! | `lodash`, `https://` | external, left as written                |

use std::path::{Path, PathBuf};

use super::ResolveError;
use crate::core::Resolver;
use crate::core::id::{is_virtual, split_namespace};
use crate::vfs::VirtualFileStore;

/// Suffixes tried, in order, for relative and root-absolute specifiers.
const PROBES: &[&str] = &["", ".js", ".mjs", "/index.js"];

/// Outcome of resolving a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A module in the build graph.
    Id(String),
    /// Left for the browser (bare package, URL, unregistered namespace).
    External,
}

pub fn resolve_specifier(
    resolver: &Resolver,
    vfs: &VirtualFileStore,
    specifier: &str,
    importer: &str,
) -> Result<Resolved, ResolveError> {
    let error = || ResolveError {
        specifier: specifier.to_string(),
        importer: importer.to_string(),
    };

    if split_namespace(specifier).is_some() {
        return Ok(if vfs.contains(specifier) {
            Resolved::Id(specifier.to_string())
        } else {
            Resolved::External
        });
    }

    let base = if specifier.starts_with("./") || specifier.starts_with("../") {
        importer_dir(resolver, importer)
    } else if let Some(rest) = specifier.strip_prefix('/') {
        return find_file(resolver, &resolver.root().join(rest)).ok_or_else(error);
    } else {
        return Ok(Resolved::External);
    };

    find_file(resolver, &base.join(specifier)).ok_or_else(error)
}

fn importer_dir(resolver: &Resolver, importer: &str) -> PathBuf {
    if is_virtual(importer) {
        return resolver.root().to_path_buf();
    }
    resolver
        .id_to_path(importer)
        .and_then(|path| path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| resolver.root().to_path_buf())
}

fn find_file(resolver: &Resolver, candidate: &Path) -> Option<Resolved> {
    let raw = candidate.as_os_str().to_string_lossy();
    PROBES
        .iter()
        .map(|suffix| PathBuf::from(format!("{raw}{suffix}")))
        .find(|path| path.is_file())
        .map(|path| Resolved::Id(resolver.path_to_id(&path)))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::related::RelatedWatcher;
    use crate::vfs::{VirtualData, VirtualFile};

    fn setup() -> (TempDir, Resolver, Arc<VirtualFileStore>) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/lib")).unwrap();
        fs::write(root.join("src/main.js"), "").unwrap();
        fs::write(root.join("src/util.mjs"), "").unwrap();
        fs::write(root.join("src/lib/index.js"), "").unwrap();

        let resolver = Resolver::new(root, Path::new("src"), Path::new("dist"));
        let vfs = VirtualFileStore::new(Arc::new(RelatedWatcher::detached()));
        (dir, resolver, vfs)
    }

    #[test]
    fn test_relative_probing() {
        let (_dir, resolver, vfs) = setup();
        let resolve = |spec| resolve_specifier(&resolver, &vfs, spec, "src/main.js");

        assert_eq!(resolve("./main.js"), Ok(Resolved::Id("src/main.js".into())));
        assert_eq!(resolve("./util"), Ok(Resolved::Id("src/util.mjs".into())));
        assert_eq!(resolve("./lib"), Ok(Resolved::Id("src/lib/index.js".into())));
        assert!(resolve("./missing").is_err());
    }

    #[test]
    fn test_root_absolute() {
        let (_dir, resolver, vfs) = setup();
        assert_eq!(
            resolve_specifier(&resolver, &vfs, "/src/main.js", "index.html"),
            Ok(Resolved::Id("src/main.js".into()))
        );
    }

    #[test]
    fn test_bare_and_url_are_external() {
        let (_dir, resolver, vfs) = setup();
        for spec in ["lodash", "https://cdn.example.com/x.js", "node:fs"] {
            assert_eq!(
                resolve_specifier(&resolver, &vfs, spec, "src/main.js"),
                Ok(Resolved::External),
                "{spec}"
            );
        }
    }

    #[test]
    fn test_registered_virtual_module() {
        let (_dir, resolver, vfs) = setup();
        vfs.set("env:public", VirtualFile::fixed(VirtualData::js("")));
        assert_eq!(
            resolve_specifier(&resolver, &vfs, "env:public", "src/main.js"),
            Ok(Resolved::Id("env:public".into()))
        );
    }
}
