use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use super::*;
use crate::bundle::Entry;
use crate::core::{BuildMode, Resolver};
use crate::hmr::{ClientSet, Hmr};
use crate::plugin::{HmrHook, HookFuture, Plugin, Plugins};
use crate::related::{ChangeKind, RelatedWatcher};
use crate::session::{BuildContext, BuildSession};
use crate::vfs::{VirtualData, VirtualFile};

// ============================================================================
// fixtures
// ============================================================================

/// Accepts ids with one extension and records what it is asked to do.
struct Recorder {
    accept: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn hmr(&self) -> Option<&dyn HmrHook> {
        Some(self)
    }
}

impl HmrHook for Recorder {
    fn accept(&self, id: &str) -> bool {
        id.ends_with(self.accept)
    }

    fn update<'a>(&'a self, _hmr: &'a Hmr, ids: &'a [String]) -> HookFuture<'a> {
        Box::pin(async move {
            self.log.lock().push(format!("update:{}", ids.join(",")));
            Ok(())
        })
    }

    fn full_reload<'a>(&'a self, _hmr: &'a Hmr) -> HookFuture<'a> {
        Box::pin(async move {
            self.log.lock().push("full".to_string());
            Ok(())
        })
    }
}

fn page(scripts: &[&str], styles: &[&str]) -> String {
    let links: String = styles
        .iter()
        .map(|s| format!(r#"<link rel="stylesheet" href="{s}">"#))
        .collect();
    let tags: String = scripts
        .iter()
        .map(|s| format!(r#"<script src="{s}"></script>"#))
        .collect();
    format!("<!doctype html><html><head>{links}</head><body>{tags}</body></html>")
}

struct Harness {
    _dir: TempDir,
    root: PathBuf,
    orchestrator: Orchestrator,
    log: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    fn write(&self, rel: &str, content: &str) -> (PathBuf, ChangeKind) {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        (path, ChangeKind::Modified)
    }

    fn remove(&self, rel: &str) -> (PathBuf, ChangeKind) {
        let path = self.path(rel);
        fs::remove_file(&path).unwrap();
        (path, ChangeKind::Removed)
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

struct Setup {
    files: Vec<(&'static str, String)>,
    entries: Vec<(&'static str, bool)>,
    standalone: Vec<&'static str>,
    accept: &'static str,
    related: Vec<(&'static str, &'static str)>,
    /// `(virtual id, data file)`: a per-request module that re-reads the file.
    generated: Option<(&'static str, &'static str)>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            files: vec![
                ("src/a.html", page(&["./common.js", "./a.js"], &["./a.css"])),
                ("src/b.html", page(&["./common.js"], &["./b.css"])),
                ("src/common.js", "export const x = 1;\n".into()),
                ("src/a.js", "import { x } from './common.js';\nconsole.log(x);\n".into()),
                ("src/a.css", ".a { color: red }\n".into()),
                ("src/b.css", ".b { color: blue }\n".into()),
            ],
            entries: vec![("src/a.html", true), ("src/b.html", true)],
            standalone: Vec::new(),
            accept: ".css",
            related: Vec::new(),
            generated: None,
        }
    }
}

impl Setup {
    fn build(self) -> Harness {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        for (rel, content) in &self.files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let plugins = Plugins::new(vec![Arc::new(Recorder {
            accept: self.accept,
            log: Arc::clone(&log),
        })]);
        let resolver = Resolver::new(&root, Path::new("src"), Path::new("dist"));
        let ctx = BuildContext::new(
            resolver,
            BuildMode::DEVELOPMENT,
            "development",
            Arc::new(RelatedWatcher::detached()),
            plugins,
        )
        .unwrap();
        for (file, related) in &self.related {
            ctx.related.watch_file(&root.join(file), related);
        }
        if let Some((id, data)) = self.generated {
            let data = root.join(data);
            ctx.vfs.set(
                id,
                VirtualFile::request(move |_| {
                    let json = fs::read_to_string(&data)?;
                    Ok(Some(
                        VirtualData::js(format!("export default {json};\n"))
                            .with_watch_files([data.clone()]),
                    ))
                }),
            );
        }

        let mut entries: Vec<Entry> = self
            .entries
            .iter()
            .map(|(file, hmr)| Entry::new(root.join(file)).with_hmr(*hmr))
            .collect();
        entries.extend(
            self.standalone
                .iter()
                .map(|file| Entry::new(root.join(file)).standalone()),
        );
        let mut session = BuildSession::new(&entries, &ctx.resolver);
        let errors = session.build_all(&ctx);
        assert!(errors.is_empty(), "{errors:?}");

        let hmr = Hmr::new(
            ClientSet::new(),
            Arc::clone(&ctx.vfs),
            ctx.resolver.clone(),
            Arc::clone(&ctx.engine),
            "http://localhost:5173",
        );
        Harness {
            _dir: dir,
            root,
            orchestrator: Orchestrator::new(ctx, session, hmr),
            log,
        }
    }
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// reload decision
// ============================================================================

struct Accept(&'static str);

impl HmrHook for Accept {
    fn accept(&self, id: &str) -> bool {
        id.ends_with(self.0)
    }

    fn update<'a>(&'a self, _hmr: &'a Hmr, _ids: &'a [String]) -> HookFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

fn modules(items: &[&str]) -> ChangeSet {
    ChangeSet {
        modules: ids(items),
        all: ids(items),
        ..ChangeSet::default()
    }
}

#[test]
fn test_page_change_forces_full_reload() {
    let css = Accept(".css");
    let mut changes = modules(&["src/a.css"]);
    changes.pages = ids(&["src/index.html"]);
    assert_eq!(decide_reload(&changes, &BTreeSet::new(), &[&css]), Reload::Full);
}

#[test]
fn test_standalone_change_forces_full_reload() {
    let mut changes = ChangeSet::default();
    changes.scripts = ids(&["src/worker.js"]);
    assert_eq!(decide_reload(&changes, &BTreeSet::new(), &[]), Reload::Full);
}

#[test]
fn test_disabled_input_beats_accepting_hook() {
    let any = Accept("");
    let changes = modules(&["src/legacy.js"]);
    let disabled = ids(&["src/legacy.js"]);
    assert_eq!(decide_reload(&changes, &disabled, &[&any]), Reload::Full);
}

#[test]
fn test_first_accepting_hook_claims() {
    let css = Accept(".css");
    let any = Accept("");
    let changes = modules(&["src/a.css", "src/b.js", "src/c.css"]);
    assert_eq!(
        decide_reload(&changes, &BTreeSet::new(), &[&css, &any]),
        Reload::Partial(vec![
            (0, vec!["src/a.css".to_string(), "src/c.css".to_string()]),
            (1, vec!["src/b.js".to_string()]),
        ])
    );
}

#[test]
fn test_unclaimed_module_escalates_whole_batch() {
    let css = Accept(".css");
    let partial = modules(&["src/a.css"]);
    assert!(!decide_reload(&partial, &BTreeSet::new(), &[&css]).is_full());

    // Adding ids never turns a full reload back into a partial one.
    let grown = modules(&["src/a.css", "src/main.js"]);
    assert!(decide_reload(&grown, &BTreeSet::new(), &[&css]).is_full());
    let mut grown_more = modules(&["src/a.css", "src/main.js", "src/b.css"]);
    grown_more.pages = ids(&["src/index.html"]);
    assert!(decide_reload(&grown_more, &BTreeSet::new(), &[&css]).is_full());
}

// ============================================================================
// passes
// ============================================================================

#[tokio::test]
async fn test_css_change_is_hot_updated() {
    let mut h = Setup::default().build();
    let change = h.write("src/a.css", ".a { color: green }\n");

    let report = h.orchestrator.run_pass(&[change]).await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.changes.modules, ids(&["src/a.css"]));
    assert_eq!(
        report.reload,
        Reload::Partial(vec![(0, vec!["src/a.css".to_string()])])
    );
    assert!(report.styles_rebuilt);
    assert!(h.read("dist/a.css").contains("green"));
    assert_eq!(h.log(), vec!["update:src/a.css"]);
}

#[tokio::test]
async fn test_hmr_disabled_entry_reloads_even_when_accepted() {
    let mut h = Setup {
        entries: vec![("src/a.html", false)],
        accept: ".js",
        ..Setup::default()
    }
    .build();
    let change = h.write("src/a.js", "console.log('edited');\n");

    let report = h.orchestrator.run_pass(&[change]).await;

    assert!(report.reload.is_full());
    assert_eq!(report.rebuilt, vec![crate::bundle::BundleKey::Shared("default".into())]);
    assert!(h.read("dist/a.js").contains("edited"));
    assert_eq!(h.log(), vec!["full"]);
}

#[tokio::test]
async fn test_css_and_page_change_rebuild_every_style() {
    let mut h = Setup::default().build();
    let css = h.write("src/a.css", ".a { color: green }\n");
    let html = h.write("src/a.html", &page(&["./common.js", "./a.js"], &["./a.css"]));
    // Edited on disk but not part of the batch.
    h.write("src/b.css", ".b { color: purple }\n");

    let report = h.orchestrator.run_pass(&[css, html]).await;

    assert!(report.reload.is_full());
    assert_eq!(report.changes.pages, ids(&["src/a.html"]));
    assert!(h.read("dist/a.css").contains("green"));
    assert!(h.read("dist/b.css").contains("purple"));
    assert_eq!(h.log(), vec!["full"]);
}

#[tokio::test]
async fn test_unclaimed_module_reloads() {
    let mut h = Setup::default().build();
    let change = h.write("src/common.js", "export const x = 2;\n");

    let report = h.orchestrator.run_pass(&[change]).await;

    assert_eq!(report.changes.modules, ids(&["src/common.js"]));
    assert!(report.reload.is_full());
    assert_eq!(h.log(), vec!["full"]);
}

#[tokio::test]
async fn test_errors_notify_nobody_and_retry_next_pass() {
    let mut h = Setup::default().build();
    let broken = h.write("src/a.js", "import './missing.js';\n");

    let report = h.orchestrator.run_pass(&[broken]).await;
    assert_eq!(report.errors.len(), 1);
    assert!(h.log().is_empty());

    // Any later change retries the failed bundle.
    h.write("src/a.js", "console.log('fixed');\n");
    let unrelated = h.write("src/b.css", ".b { color: teal }\n");
    let report = h.orchestrator.run_pass(&[unrelated]).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(report.rebuilt.contains(&crate::bundle::BundleKey::Shared("default".into())));
    assert!(h.read("dist/a.js").contains("fixed"));
}

#[tokio::test]
async fn test_removed_script_prunes_empty_output_dirs() {
    let mut h = Setup {
        files: vec![("src/deep/nested/x.js", "console.log('x');\n".into())],
        entries: Vec::new(),
        standalone: vec!["src/deep/nested/x.js"],
        ..Setup::default()
    }
    .build();
    assert!(h.path("dist/deep/nested/x.js").exists());

    let change = h.remove("src/deep/nested/x.js");
    let report = h.orchestrator.run_pass(&[change]).await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.changes.removed, ids(&["src/deep/nested/x.js"]));
    assert!(!h.path("dist/deep").exists());
    assert!(h.path("dist").is_dir());
}

#[tokio::test]
async fn test_removed_standalone_does_not_fail_later_passes() {
    let mut h = Setup {
        standalone: vec!["src/deep/x.js"],
        files: {
            let mut files = Setup::default().files;
            files.push(("src/deep/x.js", "console.log('x');\n".into()));
            files
        },
        ..Setup::default()
    }
    .build();

    let removed = h.remove("src/deep/x.js");
    let report = h.orchestrator.run_pass(&[removed]).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(h.orchestrator.session().graph.standalone.is_empty());

    let edit = h.write("src/a.css", ".a { color: green }\n");
    let report = h.orchestrator.run_pass(&[edit]).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(h.log(), vec!["full", "update:src/a.css"]);
}

#[tokio::test]
async fn test_related_file_marks_page_changed() {
    let mut h = Setup {
        files: vec![
            ("src/a.html", page(&[], &[])),
            ("data/site.json", "{}".into()),
        ],
        entries: vec![("src/a.html", true)],
        related: vec![("data/site.json", "src/a.html")],
        ..Setup::default()
    }
    .build();
    let change = h.write("data/site.json", r#"{"title": "x"}"#);

    let report = h.orchestrator.run_pass(&[change]).await;

    assert_eq!(report.changes.pages, ids(&["src/a.html"]));
    assert!(report.reload.is_full());
}

#[tokio::test]
async fn test_watch_files_of_generated_module_rebuild_importer() {
    let mut h = Setup {
        files: {
            let mut files = Setup::default().files;
            files.retain(|(rel, _)| *rel != "src/a.js");
            files.push(("src/a.js", "import data from 'gen:data';\nconsole.log(data);\n".into()));
            files.push(("data/site.json", r#"{"title": "one"}"#.into()));
            files
        },
        generated: Some(("gen:data", "data/site.json")),
        ..Setup::default()
    }
    .build();
    let default = crate::bundle::BundleKey::Shared("default".into());
    assert!(
        h.orchestrator.session().graph.bundles["default"]
            .resolved_inputs
            .contains("gen:data")
    );

    let change = h.write("data/site.json", r#"{"title": "two"}"#);
    let report = h.orchestrator.run_pass(&[change]).await;

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert!(report.changes.modules.contains("gen:data"));
    assert_eq!(report.rebuilt, vec![default]);
    assert!(report.reload.is_full());
}

#[tokio::test]
async fn test_output_changes_are_skipped() {
    let mut h = Setup::default().build();
    let change = h.write("dist/a.js", "// written by a build\n");

    let report = h.orchestrator.run_pass(&[change]).await;

    assert!(report.changes.is_empty());
    assert!(report.rebuilt.is_empty());
    assert!(h.log().is_empty());
}
