//! Long-lived services shared by every pass of a run.

use std::sync::Arc;

use anyhow::Result;

use crate::bundle::JobOptions;
use crate::bundle::engine::{ModuleEngine, TransformEngine};
use crate::core::{BuildMode, Resolver};
use crate::document::RenderContext;
use crate::hmr::ModuleRegistry;
use crate::plugin::{Plugins, SetupContext};
use crate::related::RelatedWatcher;
use crate::vfs::VirtualFileStore;

pub struct BuildContext {
    pub resolver: Resolver,
    pub mode: BuildMode,
    pub vfs: Arc<VirtualFileStore>,
    pub related: Arc<RelatedWatcher>,
    pub plugins: Plugins,
    pub engine: Arc<dyn TransformEngine>,
    /// Modules served to the dev client; filled in watch mode only.
    pub registry: Arc<ModuleRegistry>,
}

impl BuildContext {
    /// Run plugin setup, then create the engine with the plugins' transforms.
    pub fn new(
        resolver: Resolver,
        mode: BuildMode,
        env_mode: &str,
        related: Arc<RelatedWatcher>,
        plugins: Plugins,
    ) -> Result<Self> {
        let vfs = VirtualFileStore::new(Arc::clone(&related));
        plugins.setup(&SetupContext {
            resolver: &resolver,
            vfs: &vfs,
            mode,
            env_mode,
        })?;

        let engine = ModuleEngine::new(resolver.clone(), Arc::clone(&vfs), plugins.transforms());
        Ok(Self {
            resolver,
            mode,
            vfs,
            related,
            plugins,
            engine: Arc::new(engine),
            registry: Arc::new(ModuleRegistry::default()),
        })
    }

    /// Replace the engine.
    #[cfg(test)]
    pub fn with_engine(mut self, engine: Arc<dyn TransformEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn render_context(&self) -> RenderContext<'_> {
        RenderContext {
            resolver: &self.resolver,
            mode: self.mode,
            plugins: &self.plugins,
        }
    }

    pub fn job_options(&self) -> JobOptions {
        JobOptions {
            minify: self.mode.minify,
            write: true,
        }
    }
}
