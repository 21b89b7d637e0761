//! One watch pass: classify, decide, rebuild, notify.
//!
//! ```text
//! batch ─> classify ─> unlink removed ─> decide_reload
//!                                            │
//!   pages (full) + styles (css) + affected bundles
//!                                            │
//!        errors? log : full_reload hooks + reload_all | update per hook
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::classify::{ChangeSet, classify};
use super::plan::{Reload, decide_reload};
use crate::bundle::engine::BuildError;
use crate::bundle::{BundleKey, run_concurrent};
use crate::core::id::is_virtual;
use crate::hmr::Hmr;
use crate::plugin::HmrHook;
use crate::related::ChangeKind;
use crate::session::{BuildContext, BuildSession};
use crate::utils::plural::plural_count;

/// What a pass did.
#[derive(Debug)]
pub struct PassReport {
    pub changes: ChangeSet,
    pub reload: Reload,
    pub rebuilt: Vec<BundleKey>,
    pub styles_rebuilt: bool,
    pub errors: Vec<BuildError>,
}

impl PassReport {
    fn skipped() -> Self {
        Self {
            changes: ChangeSet::default(),
            reload: Reload::Partial(Vec::new()),
            rebuilt: Vec::new(),
            styles_rebuilt: false,
            errors: Vec::new(),
        }
    }
}

/// Sole owner of the build session in watch mode.
pub struct Orchestrator {
    ctx: BuildContext,
    session: BuildSession,
    hmr: Hmr,
    config_path: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(ctx: BuildContext, session: BuildSession, hmr: Hmr) -> Self {
        let orchestrator = Self {
            ctx,
            session,
            hmr,
            config_path: None,
        };
        orchestrator.watch_external_inputs();
        orchestrator
    }

    /// Report edits of the config file instead of rebuilding.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    pub async fn run_pass(&mut self, changes: &[(PathBuf, ChangeKind)]) -> PassReport {
        if let Some(config) = &self.config_path
            && changes.iter().any(|(path, _)| path == config)
        {
            crate::log!("watch"; "{} changed, restart to apply", config.display());
        }

        let set = classify(changes, &self.session, &self.ctx);
        if set.is_empty() {
            return PassReport::skipped();
        }
        crate::log!("watch"; "{} changed", plural_count(set.all.len(), "file"));

        for id in &set.removed {
            unlink(&self.ctx, id);
            self.session.graph.remove_script(id);
        }

        let plugins = self.ctx.plugins.with_hmr();
        let hooks: Vec<&dyn HmrHook> = plugins.iter().filter_map(|p| p.hmr()).collect();
        let reload = decide_reload(&set, &self.session.hmr_disabled_inputs(), &hooks);

        let mut errors = Vec::new();
        if reload.is_full() {
            let pages: BTreeSet<String> = set.pages.difference(&set.removed).cloned().collect();
            errors.extend(self.session.render_pages(&self.ctx, &pages));
        }
        let styles_rebuilt = set.has_css();
        if styles_rebuilt {
            errors.extend(self.session.rebuild_styles(&self.ctx));
        }

        let mut keys = self.session.graph.affected_by(&set.all);
        for key in self.session.stale_bundles(&set.pages) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        let jobs = self.session.take_jobs(&keys);
        let outcomes = run_concurrent(jobs, Arc::clone(&self.ctx.engine), self.ctx.job_options()).await;
        errors.extend(self.session.apply(&self.ctx, outcomes));
        self.watch_external_inputs();

        let report = PassReport {
            changes: set,
            reload,
            rebuilt: keys,
            styles_rebuilt,
            errors,
        };

        if !report.errors.is_empty() {
            let messages: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
            crate::logger::status_errors("build failed", messages.iter().map(String::as_str));
            return report;
        }

        match &report.reload {
            Reload::Full => {
                for plugin in &plugins {
                    if let Some(hook) = plugin.hmr()
                        && let Err(e) = hook.full_reload(&self.hmr).await
                    {
                        crate::log!("hmr"; "plugin `{}` full_reload failed: {:#}", plugin.name(), e);
                    }
                }
                self.hmr.reload_all().await;
                crate::logger::status_success("full reload");
            }
            Reload::Partial(claims) => {
                for (index, ids) in claims {
                    if let Err(e) = hooks[*index].update(&self.hmr, ids).await {
                        crate::log!("hmr"; "plugin `{}` update failed: {:#}", plugins[*index].name(), e);
                    }
                }
                let updated: Vec<&str> = claims.iter().flat_map(|(_, ids)| ids.iter().map(String::as_str)).collect();
                if updated.is_empty() {
                    crate::logger::status_success("rebuilt");
                } else {
                    crate::logger::status_success(&format!("hmr update: {}", updated.join(", ")));
                }
            }
        }
        report
    }

    /// Register inputs outside the source dir, and the watch files and dirs
    /// each input reported, with the related-file watcher.
    fn watch_external_inputs(&self) {
        let src = self.ctx.resolver.src_dir();
        for id in self.session.input_ids() {
            if is_virtual(&id) {
                continue;
            }
            if let Some(path) = self.ctx.resolver.id_to_path(&id)
                && !path.starts_with(src)
            {
                self.ctx.related.watch_file(&path, &id);
            }
        }

        let root = self.ctx.resolver.root();
        let graph = &self.session.graph;
        let metafiles = graph
            .bundles
            .values()
            .chain(graph.standalone.values())
            .filter_map(|bundle| bundle.last_metafile.as_ref());
        for metafile in metafiles {
            for (id, input) in &metafile.inputs {
                for file in &input.watch_files {
                    self.ctx.related.watch_file(&root.join(file), id);
                }
                for dir in &input.watch_dirs {
                    self.ctx.related.watch_directory(&root.join(dir), id);
                }
            }
        }
    }

    /// Dispose every build handle.
    pub fn dispose(&mut self) {
        self.session.dispose();
        self.hmr.clients().close_all();
    }
}

/// Forget a removed file: delete its outputs, prune directories it left
/// empty up to but excluding the output root, drop its related entries.
pub fn unlink(ctx: &BuildContext, id: &str) {
    let out_dir = ctx.resolver.out_dir();
    let mut outputs = vec![ctx.resolver.output_path(id)];
    let script = ctx.resolver.script_output_path(id);
    if script != outputs[0] {
        outputs.push(script);
    }

    for output in outputs {
        if fs::remove_file(&output).is_ok() {
            crate::debug!("watch"; "removed {}", output.display());
            prune_empty_dirs(output.parent(), out_dir);
        }
    }
    ctx.related.forget_related_file(id);
    ctx.registry.remove(id);
}

fn prune_empty_dirs(mut dir: Option<&Path>, root: &Path) {
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}
