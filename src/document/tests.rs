use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use super::*;
use crate::plugin::{DocumentHook, Plugin};

struct Project {
    dir: TempDir,
    resolver: Resolver,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/css")).unwrap();
        let resolver = Resolver::new(dir.path(), Path::new("src"), Path::new("dist"));
        Self { dir, resolver }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel)).unwrap()
    }

    fn document(&self, rel: &str) -> Document {
        Document::new(&Entry::new(self.dir.path().join(rel)), &self.resolver)
    }

    fn render(&self, doc: &mut Document, mode: BuildMode, plugins: &Plugins) -> Vec<BuildError> {
        doc.render(&RenderContext {
            resolver: &self.resolver,
            mode,
            plugins,
        })
    }
}

const PAGE: &str = r#"<!doctype html>
<html>
  <head>
    <link rel="stylesheet" href="./style.css">
    <script type="module" src="./main.js"></script>
  </head>
  <body>
    <div class="card">hello</div>
  </body>
</html>
"#;

#[test]
fn test_watch_render_injects_client() {
    let project = Project::new();
    project.write("src/index.html", PAGE);
    project.write("src/style.css", "@import './css/base.css';\n.card { color: red }\n");
    project.write("src/css/base.css", "body { margin: 0 }\n");

    let mut doc = project.document("src/index.html");
    let errors = project.render(&mut doc, BuildMode::DEVELOPMENT, &Plugins::default());
    assert!(errors.is_empty(), "{errors:?}");

    assert_eq!(doc.id, "src/index.html");
    assert!(!doc.fragment);
    assert_eq!(doc.script_ids(), BTreeSet::from(["src/main.js".to_string()]));
    assert_eq!(doc.styles.len(), 1);
    assert_eq!(doc.styles[0].url, "/style.css");
    assert!(doc.style_inputs().any(|i| i == "src/css/base.css"));

    let html = project.read("dist/index.html");
    assert!(html.contains(r#"<script type="module" src="/@weft/client.js"></script></head>"#));
    assert!(html.contains(r#"src="/main.js""#));
    assert!(project.read("dist/style.css").contains("margin: 0"));
}

#[test]
fn test_hmr_disabled_gets_stub() {
    let project = Project::new();
    project.write("src/index.html", "<!doctype html><title>x</title>");
    let mut doc = Document::new(
        &Entry::new(project.dir.path().join("src/index.html")).with_hmr(false),
        &project.resolver,
    );
    project.render(&mut doc, BuildMode::DEVELOPMENT, &Plugins::default());

    let html = project.read("dist/index.html");
    assert!(html.contains("<script type=\"module\">window.__weft_modules = {}</script>"));
    assert!(!html.contains(CLIENT_PATH));
}

#[test]
fn test_production_minifies_and_inlines_critical() {
    let project = Project::new();
    project.write("src/index.html", PAGE);
    project.write("src/style.css", ".card { color: red }\n.modal { color: blue }\n");

    let mut doc = project.document("src/index.html");
    let mode = BuildMode::new(false, true, true);
    let errors = project.render(&mut doc, mode, &Plugins::default());
    assert!(errors.is_empty(), "{errors:?}");

    let html = project.read("dist/index.html");
    assert!(!html.contains('\n'));
    assert!(!html.contains(CLIENT_PATH));
    assert!(html.contains("<style>.card{color:red}</style>"));
    assert!(!html.contains(".modal{"));
}

#[test]
fn test_fragment_output_has_no_wrappers() {
    let project = Project::new();
    project.write("src/part.html", "<nav class=\"menu\">\n  <a href=\"/\">home</a>\n</nav>\n");

    let mut doc = project.document("src/part.html");
    project.render(&mut doc, BuildMode::PRODUCTION, &Plugins::default());

    assert!(doc.fragment);
    let html = project.read("dist/part.html");
    assert!(html.starts_with("<nav"));
    assert!(!html.contains("<html"));
    assert!(!html.contains("<body"));
}

struct Marker {
    name: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Marker {
    fn name(&self) -> &str {
        self.name
    }

    fn document(&self) -> Option<&dyn DocumentHook> {
        Some(self)
    }
}

impl DocumentHook for Marker {
    fn transform(&self, page: &Page, info: &crate::plugin::DocumentInfo<'_>) -> anyhow::Result<()> {
        self.seen.lock().push(format!("{}:{}", self.name, info.id));
        if let Some(body) = page.body() {
            set_attr(&body, "data-by", self.name);
        }
        Ok(())
    }
}

#[test]
fn test_document_hooks_run_in_order() {
    let project = Project::new();
    project.write("src/index.html", "<!doctype html><body></body>");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let plugins = Plugins::new(vec![
        Arc::new(Marker { name: "first", seen: Arc::clone(&seen) }),
        Arc::new(Marker { name: "second", seen: Arc::clone(&seen) }),
    ]);

    let mut doc = project.document("src/index.html");
    project.render(&mut doc, BuildMode::DEVELOPMENT, &plugins);

    assert_eq!(
        *seen.lock(),
        vec!["first:src/index.html".to_string(), "second:src/index.html".to_string()]
    );
    assert!(project.read("dist/index.html").contains(r#"<body data-by="second">"#));
}

#[test]
fn test_style_failure_is_collected() {
    let project = Project::new();
    project.write("src/index.html", r#"<link rel="stylesheet" href="./missing.css"><p>x</p>"#);

    let mut doc = project.document("src/index.html");
    let errors = project.render(&mut doc, BuildMode::DEVELOPMENT, &Plugins::default());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "src/missing.css");
    assert_eq!(
        doc.styles[0].inputs,
        BTreeSet::from(["src/missing.css".to_string()])
    );
    assert!(project.dir.path().join("dist/index.html").exists());
}

#[test]
fn test_rebuild_styles_picks_up_new_imports() {
    let project = Project::new();
    project.write("src/index.html", PAGE);
    project.write("src/style.css", ".card { color: red }\n");

    let mut doc = project.document("src/index.html");
    project.render(&mut doc, BuildMode::DEVELOPMENT, &Plugins::default());
    assert!(!doc.style_inputs().any(|i| i == "src/css/extra.css"));

    project.write("src/css/extra.css", ".x { color: blue }\n");
    project.write("src/style.css", "@import './css/extra.css';\n.card { color: red }\n");
    let errors = doc.rebuild_styles(&project.resolver, false);
    assert!(errors.is_empty());
    assert!(doc.style_inputs().any(|i| i == "src/css/extra.css"));
    assert!(project.read("dist/style.css").contains(".x"));
}

#[test]
fn test_missing_document() {
    let project = Project::new();
    let mut doc = project.document("src/gone.html");
    let errors = project.render(&mut doc, BuildMode::DEVELOPMENT, &Plugins::default());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].path, "src/gone.html");
}
