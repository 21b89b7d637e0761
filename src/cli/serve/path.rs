//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a URL path under `serve_root`, handling index.html for directories.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);
    if has_traversal(&clean) {
        return None;
    }
    resolve_within(&serve_root.join(&clean), &[serve_root])
}

/// Resolve an absolute path, accepting it only inside one of `allowed`.
///
/// Both sides are canonicalized, so symlinks cannot leave the allowed dirs.
pub fn resolve_within(path: &Path, allowed: &[&Path]) -> Option<PathBuf> {
    let canonical = path.canonicalize().ok()?;
    let inside = allowed
        .iter()
        .filter_map(|dir| dir.canonicalize().ok())
        .any(|dir| canonical.starts_with(dir));
    if !inside {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Whether a decoded URL path tries to climb out of its root.
pub fn has_traversal(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

/// Decode, strip query and fragment, trim slashes.
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    decoded.trim_matches('/').to_string()
}
