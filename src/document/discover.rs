//! Discovery of a document's relative scripts and stylesheets.
//!
//! `<script src="./main.js">` and `<link rel="stylesheet" href="./a.css">`
//! are resolved against the document's directory and rewritten in place to
//! their build URLs. Absolute and remote references are left alone.

use std::path::Path;

use super::parse::{Page, attr, set_attr};
use crate::core::Resolver;
use crate::utils::path::lexical_normalize;

/// A script referenced by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRef {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct Discovered {
    pub scripts: Vec<ScriptRef>,
    /// Stylesheet ids, in document order.
    pub styles: Vec<String>,
}

fn is_relative(reference: &str) -> bool {
    reference.starts_with("./") || reference.starts_with("../")
}

fn resolve(resolver: &Resolver, dir: &Path, reference: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    resolver.path_to_id(&lexical_normalize(&dir.join(path)))
}

/// Find relative scripts and stylesheets, rewriting their URLs in place.
pub fn discover(page: &Page, resolver: &Resolver, document: &Path) -> Discovered {
    let dir = document.parent().unwrap_or(resolver.root());
    let mut found = Discovered::default();

    for script in page.elements("script") {
        let Some(src) = attr(&script, "src").filter(|s| is_relative(s)) else {
            continue;
        };
        let id = resolve(resolver, dir, &src);
        let url = resolver.script_output_url(&id);
        set_attr(&script, "src", &url);
        set_attr(&script, "type", "module");
        if !found.scripts.iter().any(|s| s.id == id) {
            found.scripts.push(ScriptRef { id, url });
        }
    }

    for link in page.elements("link") {
        let is_stylesheet = attr(&link, "rel").is_some_and(|rel| {
            rel.split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("stylesheet"))
        });
        if !is_stylesheet {
            continue;
        }
        let Some(href) = attr(&link, "href").filter(|h| is_relative(h)) else {
            continue;
        };
        let id = resolve(resolver, dir, &href);
        set_attr(&link, "href", &resolver.output_url(&id));
        if !found.styles.contains(&id) {
            found.styles.push(id);
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(Path::new("/p/app"), Path::new("src"), Path::new("dist"))
    }

    #[test]
    fn test_discover_and_rewrite() {
        let page = Page::parse(
            r#"<!doctype html><html><head>
<link rel="stylesheet" href="./style.css">
<link rel="icon" href="./favicon.ico">
<link rel="stylesheet" href="https://cdn.example.com/x.css">
<script src="../shared/common.js"></script>
</head><body>
<script type="module" src="./main.js?v=1"></script>
<script src="/abs.js"></script>
<script>inline()</script>
</body></html>"#,
        );
        let found = discover(&page, &resolver(), Path::new("/p/app/src/blog/index.html"));

        assert_eq!(
            found.scripts,
            vec![
                ScriptRef {
                    id: "src/shared/common.js".into(),
                    url: "/shared/common.js".into()
                },
                ScriptRef {
                    id: "src/blog/main.js".into(),
                    url: "/blog/main.js".into()
                },
            ]
        );
        assert_eq!(found.styles, vec!["src/blog/style.css".to_string()]);

        let html = page.serialize();
        assert!(html.contains(r#"href="/blog/style.css""#));
        assert!(html.contains(r#"<script src="/shared/common.js" type="module">"#));
        assert!(html.contains(r#"src="/abs.js""#));
        assert!(html.contains(r#"href="./favicon.ico""#));
    }

    #[test]
    fn test_duplicate_references_collapse() {
        let page = Page::parse(r#"<script src="./a.js"></script><script src="./a.js"></script>"#);
        let found = discover(&page, &resolver(), Path::new("/p/app/src/index.html"));
        assert_eq!(found.scripts.len(), 1);
    }
}
