//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `lexical_normalize` - resolve `.`/`..` without touching the filesystem
//! - `relative_to` - relative path between two absolute paths

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Lexical normalization if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            lexical_normalize(path)
        } else {
            std::env::current_dir().map_or_else(
                |_| lexical_normalize(path),
                |cwd| lexical_normalize(&cwd.join(path)),
            )
        }
    })
}

/// Resolve `.` and `..` components lexically.
///
/// `..` at the root of an absolute path is dropped; leading `..` of a
/// relative path is kept.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().map(|c| c.as_os_str()).collect()
}

/// Relative path from `base` to `path`, using `..` segments when `path`
/// lies outside `base`. Both paths are expected to be absolute.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path: Vec<_> = path.components().collect();
    let base: Vec<_> = base.components().collect();

    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &path[common..] {
        rel.push(component.as_os_str());
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d.js")),
            PathBuf::from("/a/c/d.js")
        );
        assert_eq!(lexical_normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(
            lexical_normalize(Path::new("../x/./y")),
            PathBuf::from("../x/y")
        );
    }

    #[test]
    fn test_relative_to_inside() {
        assert_eq!(
            relative_to(Path::new("/p/app/src/a.js"), Path::new("/p/app")),
            PathBuf::from("src/a.js")
        );
    }

    #[test]
    fn test_relative_to_outside() {
        assert_eq!(
            relative_to(Path::new("/p/lib/x.js"), Path::new("/p/app")),
            PathBuf::from("../lib/x.js")
        );
        assert_eq!(
            relative_to(Path::new("/usr/share/x.css"), Path::new("/p/app")),
            PathBuf::from("../../usr/share/x.css")
        );
    }

    #[test]
    fn test_normalize_path_nonexistent_absolute() {
        let path = Path::new("/definitely/not/../here.txt");
        assert_eq!(normalize_path(path), PathBuf::from("/definitely/here.txt"));
    }
}
