//! Plugin capabilities.
//!
//! A plugin is a capability set: each optional accessor returns a hook trait
//! object when the plugin takes part in that phase. Hooks run in
//! registration order.
//!
//! ```text
//! setup ──> transforms ──> bundles/webext ──> document ──> build_end
//!                                                 │
//!                               watch: serve, hmr ┘
//! ```

mod css_hmr;
mod env;

pub use css_hmr::CssHmr;
pub use env::Env;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::bundle::Entry;
use crate::bundle::engine::TransformHook;
use crate::core::{BuildMode, Resolver};
use crate::document::{Page, ScriptRef};
use crate::hmr::Hmr;
use crate::vfs::{Request, VirtualFileStore};

/// Boxed future returned by async hooks.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// What a plugin can reach during setup.
pub struct SetupContext<'a> {
    pub resolver: &'a Resolver,
    pub vfs: &'a Arc<VirtualFileStore>,
    pub mode: BuildMode,
    /// Suffix of the env files to load (`.env.<mode>`).
    pub env_mode: &'a str,
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Runs once, before the engine is created.
    fn setup(&self, _ctx: &SetupContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Source transforms handed to the engine.
    fn transforms(&self) -> Vec<Arc<dyn TransformHook>> {
        Vec::new()
    }

    fn document(&self) -> Option<&dyn DocumentHook> {
        None
    }

    fn serve(&self) -> Option<&dyn ServeHook> {
        None
    }

    fn hmr(&self) -> Option<&dyn HmrHook> {
        None
    }

    fn bundles(&self) -> Option<&dyn BundlesHook> {
        None
    }

    fn build_end(&self) -> Option<&dyn BuildEndHook> {
        None
    }

    fn webext(&self) -> Option<&dyn WebextHook> {
        None
    }
}

/// Facts about the document being rendered.
pub struct DocumentInfo<'a> {
    pub id: &'a str,
    pub bundle: &'a str,
    pub mode: BuildMode,
    pub scripts: &'a [ScriptRef],
}

/// Mutates a document's tree before it is serialized.
pub trait DocumentHook: Send + Sync {
    fn transform(&self, page: &Page, info: &DocumentInfo<'_>) -> anyhow::Result<()>;
}

/// A response produced by a [`ServeHook`].
#[derive(Debug, Clone)]
pub struct ServeResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl ServeResponse {
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: content_type.into(),
            body: body.into(),
        }
    }
}

/// Answers dev-server requests ahead of the built-in routes.
pub trait ServeHook: Send + Sync {
    fn handle(&self, request: &Request) -> Option<ServeResponse>;
}

/// Claims changed modules and patches them into running clients.
pub trait HmrHook: Send + Sync {
    /// Whether this hook can update `id` without a full reload.
    fn accept(&self, id: &str) -> bool;

    /// Push the accepted ids to the clients.
    fn update<'a>(&'a self, hmr: &'a Hmr, ids: &'a [String]) -> HookFuture<'a>;

    /// Runs before clients are told to reload.
    fn full_reload<'a>(&'a self, _hmr: &'a Hmr) -> HookFuture<'a> {
        Box::pin(async { Ok(()) })
    }
}

/// Contributes entries before the first build.
pub trait BundlesHook: Send + Sync {
    fn extra_entries(&self, resolver: &Resolver) -> Vec<Entry>;
}

/// Totals of a finished production build.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub documents: usize,
    pub bundles: usize,
    pub styles: usize,
    pub elapsed: Duration,
    pub out_dir: PathBuf,
}

/// Runs after a successful production build.
pub trait BuildEndHook: Send + Sync {
    fn build_end(&self, summary: &BuildSummary) -> anyhow::Result<()>;
}

/// Contributes browser-extension entry scripts for `--webext <target>`.
pub trait WebextHook: Send + Sync {
    fn entries(&self, target: &str, resolver: &Resolver) -> Vec<Entry>;
}

/// Registered plugins, in registration order.
#[derive(Clone, Default)]
pub struct Plugins(Vec<Arc<dyn Plugin>>);

impl Plugins {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self(plugins)
    }

    /// The plugins shipped with weft.
    pub fn builtin() -> Self {
        Self(vec![Arc::new(CssHmr::default()), Arc::new(Env::default())])
    }

    pub fn push(&mut self, plugin: Arc<dyn Plugin>) {
        self.0.push(plugin);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn setup(&self, ctx: &SetupContext<'_>) -> anyhow::Result<()> {
        for plugin in &self.0 {
            plugin
                .setup(ctx)
                .map_err(|e| e.context(format!("plugin `{}` setup failed", plugin.name())))?;
        }
        Ok(())
    }

    pub fn transforms(&self) -> Vec<Arc<dyn TransformHook>> {
        self.0.iter().flat_map(|p| p.transforms()).collect()
    }

    pub fn documents(&self) -> impl Iterator<Item = &dyn DocumentHook> {
        self.0.iter().filter_map(|p| p.document())
    }

    pub fn serves(&self) -> impl Iterator<Item = &dyn ServeHook> {
        self.0.iter().filter_map(|p| p.serve())
    }

    /// Plugins with an HMR hook, so callers can hold them across awaits.
    pub fn with_hmr(&self) -> Vec<Arc<dyn Plugin>> {
        self.0.iter().filter(|p| p.hmr().is_some()).cloned().collect()
    }

    /// Entries from bundle hooks and, with `target`, webext hooks.
    pub fn extra_entries(&self, resolver: &Resolver, webext: Option<&str>) -> Vec<Entry> {
        let mut entries = Vec::new();
        for plugin in &self.0 {
            if let Some(hook) = plugin.bundles() {
                entries.extend(hook.extra_entries(resolver));
            }
            if let (Some(target), Some(hook)) = (webext, plugin.webext()) {
                entries.extend(hook.entries(target, resolver));
            }
        }
        entries
    }

    pub fn build_end(&self, summary: &BuildSummary) -> anyhow::Result<()> {
        for plugin in &self.0 {
            if let Some(hook) = plugin.build_end() {
                hook.build_end(summary)
                    .map_err(|e| e.context(format!("plugin `{}` build_end failed", plugin.name())))?;
            }
        }
        Ok(())
    }
}
