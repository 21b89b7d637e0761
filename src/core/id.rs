//! Canonical identifier space.
//!
//! Every component keys its maps by the same string id:
//!
//! | Input                          | Id                 |
//! |--------------------------------|--------------------|
//! | `<root>/src/a.js`              | `src/a.js`         |
//! | `<root>/../lib/x.js`           | `../lib/x.js`      |
//! | virtual module `env:public`    | `env:public`       |
//! | URI `/src/a.js?v=3`            | `src/a.js`         |
//! | URI `/@fs/abs/lib/x.js`        | `../lib/x.js`      |
//!
//! The `file` namespace is implicit. Ids never start with `/`.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::utils::path::{lexical_normalize, relative_to};

/// URI prefix for files outside the project root.
pub const FS_PREFIX: &str = "/@fs/";

/// Output subdirectory for modules that do not live under the source dir.
pub const GENERATED_DIR: &str = "_";

/// Characters escaped when an id is rendered into a URI.
const URI_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Split a namespaced id into `(namespace, payload)`.
///
/// Returns `None` for file ids. A namespace is at least two characters so
/// that Windows drive letters are never mistaken for one, and never
/// contains `/`.
pub fn split_namespace(id: &str) -> Option<(&str, &str)> {
    let (ns, payload) = id.split_once(':')?;
    let mut chars = ns.chars();
    let valid = ns.len() > 1
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'));
    valid.then_some((ns, payload))
}

/// Whether the id belongs to a non-`file` namespace.
#[inline]
pub fn is_virtual(id: &str) -> bool {
    split_namespace(id).is_some()
}

/// Whether a file id points outside the project root.
#[inline]
fn escapes_root(id: &str) -> bool {
    id == ".." || id.starts_with("../")
}

/// Render a path with `/` separators.
fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Rebuild an absolute path from the tail of an `/@fs/` URI.
fn absolute_from_fs(rest: &str) -> PathBuf {
    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        PathBuf::from(rest)
    } else {
        PathBuf::from(format!("/{rest}"))
    }
}

fn encode(s: &str) -> String {
    utf8_percent_encode(s, URI_ESCAPE).to_string()
}

/// Maps between filesystem paths, ids, dev-server URIs and output paths.
///
/// All three directories are absolute and lexically normalized.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    src: PathBuf,
    out: PathBuf,
}

impl Resolver {
    pub fn new(root: &Path, src: &Path, out: &Path) -> Self {
        let root = lexical_normalize(root);
        Self {
            src: lexical_normalize(&root.join(src)),
            out: lexical_normalize(&root.join(out)),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> &Path {
        &self.src
    }

    pub fn out_dir(&self) -> &Path {
        &self.out
    }

    /// Id of a filesystem path (absolute, or relative to the root).
    pub fn path_to_id(&self, path: &Path) -> String {
        let abs = if path.is_absolute() {
            lexical_normalize(path)
        } else {
            lexical_normalize(&self.root.join(path))
        };
        to_slash(&relative_to(&abs, &self.root))
    }

    /// Absolute path of a file id; `None` for virtual ids.
    pub fn id_to_path(&self, id: &str) -> Option<PathBuf> {
        if is_virtual(id) {
            return None;
        }
        Some(lexical_normalize(&self.root.join(id)))
    }

    /// Dev-server URI of an id.
    pub fn id_to_uri(&self, id: &str) -> String {
        if !is_virtual(id) && escapes_root(id) {
            let abs = lexical_normalize(&self.root.join(id));
            let abs = abs.to_string_lossy().replace('\\', "/");
            return format!("{FS_PREFIX}{}", encode(abs.trim_start_matches('/')));
        }
        format!("/{}", encode(id))
    }

    /// Id addressed by a dev-server URI. Query and fragment are ignored.
    pub fn uri_to_id(&self, uri: &str) -> String {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let decoded: Cow<'_, str> = percent_decode_str(path).decode_utf8_lossy();

        if let Some(rest) = decoded.strip_prefix(FS_PREFIX) {
            return self.path_to_id(&absolute_from_fs(rest));
        }
        decoded
            .strip_prefix('/')
            .unwrap_or(&decoded)
            .to_string()
    }

    /// Build output location of an id.
    ///
    /// Files under the source dir mirror their layout beneath the output
    /// dir. Everything else lands under `out/_/`, with `..` segments written
    /// as `__` and namespaces as a directory.
    pub fn output_path(&self, id: &str) -> PathBuf {
        let generated = self.out.join(GENERATED_DIR);
        if let Some((ns, payload)) = split_namespace(id) {
            return generated.join(ns).join(sanitize(payload));
        }

        let abs = lexical_normalize(&self.root.join(id));
        match abs.strip_prefix(&self.src) {
            Ok(rel) if !rel.as_os_str().is_empty() => self.out.join(rel),
            _ => generated.join(sanitize(id)),
        }
    }

    /// URL under which the output of an id is served.
    pub fn output_url(&self, id: &str) -> String {
        let rel = relative_to(&self.output_path(id), &self.out);
        format!("/{}", encode(&to_slash(&rel)))
    }

    /// Output location of a script module; always ends in a script extension.
    pub fn script_output_path(&self, id: &str) -> PathBuf {
        let path = self.output_path(id);
        match path.extension().and_then(|e| e.to_str()) {
            Some("js" | "mjs" | "cjs") => path,
            _ => {
                let mut name = path.into_os_string();
                name.push(".js");
                PathBuf::from(name)
            }
        }
    }

    /// URL under which a script module's output is served.
    pub fn script_output_url(&self, id: &str) -> String {
        let rel = relative_to(&self.script_output_path(id), &self.out);
        format!("/{}", encode(&to_slash(&rel)))
    }

    /// Whether a path lies inside the build output directory.
    pub fn is_output(&self, path: &Path) -> bool {
        lexical_normalize(path).starts_with(&self.out)
    }
}

/// Turn an id tail into a relative path that cannot escape its parent.
fn sanitize(payload: &str) -> PathBuf {
    payload
        .split(['/', ':'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(|segment| if segment == ".." { "__" } else { segment })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(Path::new("/p/app"), Path::new("src"), Path::new("dist"))
    }

    #[test]
    fn test_path_to_id_inside_root() {
        let r = resolver();
        assert_eq!(r.path_to_id(Path::new("/p/app/src/a.js")), "src/a.js");
        assert_eq!(r.path_to_id(Path::new("src/./b/../a.js")), "src/a.js");
    }

    #[test]
    fn test_path_to_id_outside_root() {
        let r = resolver();
        assert_eq!(r.path_to_id(Path::new("/p/lib/x.js")), "../lib/x.js");
    }

    #[test]
    fn test_id_to_uri_forms() {
        let r = resolver();
        assert_eq!(r.id_to_uri("src/a.js"), "/src/a.js");
        assert_eq!(r.id_to_uri("../lib/x.js"), "/@fs/p/lib/x.js");
        assert_eq!(r.id_to_uri("env:public"), "/env:public");
        assert_eq!(r.id_to_uri("src/my file.js"), "/src/my%20file.js");
    }

    #[test]
    fn test_uri_to_id_strips_query_and_fragment() {
        let r = resolver();
        assert_eq!(r.uri_to_id("/src/a.css?v=12"), "src/a.css");
        assert_eq!(r.uri_to_id("/src/a.js#top"), "src/a.js");
        assert_eq!(r.uri_to_id("/@fs/p/lib/x.js?import"), "../lib/x.js");
    }

    #[test]
    fn test_round_trip() {
        let r = resolver();
        let ids = [
            "src/a.js",
            "index.html",
            "src/nested/deep/mod.mjs",
            "../lib/x.js",
            "../../usr/share/data.json",
            "env:public",
            "weft-eval:7",
            "unknown-ns:some/payload?with=query",
            "src/100% real.js",
            "src/what?.js",
            "src/hash#tag.css",
        ];
        for id in ids {
            assert_eq!(r.uri_to_id(&r.id_to_uri(id)), id, "round trip of {id}");
        }
    }

    #[test]
    fn test_split_namespace() {
        assert_eq!(split_namespace("env:public"), Some(("env", "public")));
        assert_eq!(split_namespace("src/a:b.js"), None);
        assert_eq!(split_namespace("C:/x"), None);
        assert_eq!(split_namespace("plain.js"), None);
    }

    #[test]
    fn test_id_to_path() {
        let r = resolver();
        assert_eq!(
            r.id_to_path("src/a.js"),
            Some(PathBuf::from("/p/app/src/a.js"))
        );
        assert_eq!(r.id_to_path("env:public"), None);
    }

    #[test]
    fn test_output_path_mapping() {
        let r = resolver();
        assert_eq!(
            r.output_path("src/pages/index.html"),
            PathBuf::from("/p/app/dist/pages/index.html")
        );
        assert_eq!(
            r.output_path("vendor/lib.js"),
            PathBuf::from("/p/app/dist/_/vendor/lib.js")
        );
        assert_eq!(
            r.output_path("../lib/x.js"),
            PathBuf::from("/p/app/dist/_/__/lib/x.js")
        );
        assert_eq!(
            r.output_path("env:public"),
            PathBuf::from("/p/app/dist/_/env/public")
        );
    }

    #[test]
    fn test_output_url() {
        let r = resolver();
        assert_eq!(r.output_url("src/main.js"), "/main.js");
        assert_eq!(r.output_url("../lib/x.js"), "/_/__/lib/x.js");
    }

    #[test]
    fn test_script_output_extension() {
        let r = resolver();
        assert_eq!(
            r.script_output_path("src/main.js"),
            PathBuf::from("/p/app/dist/main.js")
        );
        assert_eq!(r.script_output_url("env:public"), "/_/env/public.js");
        assert_eq!(r.script_output_url("src/data.json"), "/data.json.js");
    }

    #[test]
    fn test_is_output() {
        let r = resolver();
        assert!(r.is_output(Path::new("/p/app/dist/main.js")));
        assert!(!r.is_output(Path::new("/p/app/src/main.js")));
    }
}
