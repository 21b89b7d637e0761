//! Running code in a client.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use super::message::EvaluateRequest;
use super::{ClientId, Hmr, ModuleCacheKey};
use crate::bundle::engine::BuildOptions;
use crate::vfs::{VirtualData, VirtualFile, VirtualFileStore};

/// Namespace of one-shot expression modules.
pub const EVAL_NAMESPACE: &str = "weft-eval";

/// Namespace of compiled modules shared by concurrent evaluations.
pub const MODULE_NAMESPACE: &str = "weft-module";

/// Unregisters a one-shot expression module, also when the evaluation is
/// cancelled.
struct EvalFile<'a> {
    vfs: &'a VirtualFileStore,
    id: &'a str,
}

impl Drop for EvalFile<'_> {
    fn drop(&mut self) {
        self.vfs.unset(self.id);
    }
}

/// One caller's hold on a compiled module. Dropping the last lease removes
/// the module from the cache and the store.
struct ModuleLease<'a> {
    hmr: &'a Hmr,
    key: ModuleCacheKey,
    module: Arc<CompiledModule>,
}

impl Drop for ModuleLease<'_> {
    fn drop(&mut self) {
        self.hmr.release(&self.key, &self.module);
    }
}

/// A module compiled for evaluation, shared while any caller uses it.
pub(super) struct CompiledModule {
    /// Virtual id it is served under.
    id: String,
    /// Whether compilation succeeded; set once.
    ready: OnceCell<bool>,
    refs: AtomicUsize,
}

impl Hmr {
    /// Evaluate `expr` in a client. Inside the expression `args` holds the
    /// arguments. Resolves to `None` when the client disconnects.
    pub async fn evaluate(&self, client: ClientId, expr: &str, args: Vec<Value>) -> Option<Value> {
        let n = self.inner.next_eval.fetch_add(1, Ordering::Relaxed);
        let id = format!("{EVAL_NAMESPACE}:{n}");
        self.inner.vfs.set(
            &id,
            VirtualFile::fixed(VirtualData::js(format!(
                "export default (...args) => ({expr});\n"
            ))),
        );
        let _file = EvalFile {
            vfs: &self.inner.vfs,
            id: &id,
        };
        self.request(client, &id, &args).await
    }

    /// Evaluate `expr` in every client concurrently.
    pub async fn evaluate_all(&self, expr: &str, args: Vec<Value>) -> Vec<Option<Value>> {
        let mut set = JoinSet::new();
        for client in self.inner.clients.ids() {
            let hmr = self.clone();
            let expr = expr.to_string();
            let args = args.clone();
            set.spawn(async move { hmr.evaluate(client, &expr, args).await });
        }
        let mut results = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            results.push(joined.ok().flatten());
        }
        results
    }

    pub async fn reload(&self, client: ClientId) -> Option<Value> {
        self.evaluate(client, "location.reload()", Vec::new()).await
    }

    pub async fn get_url(&self, client: ClientId) -> Option<String> {
        self.evaluate(client, "location.href", Vec::new())
            .await
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Reload every client in parallel.
    pub async fn reload_all(&self) {
        let count = self.evaluate_all("location.reload()", Vec::new()).await.len();
        crate::debug!("hmr"; "reloaded {} clients", count);
    }

    /// Compile `file` as a standalone script and call its default export in
    /// a client with `args`.
    ///
    /// Compilations are cached by `(id, mtime)`: concurrent evaluations of
    /// an unchanged file share one compiled virtual module, which is
    /// unregistered when the last of them finishes or is dropped.
    pub async fn evaluate_module(&self, client: ClientId, file: &Path, args: Vec<Value>) -> Option<Value> {
        let source_id = self.inner.resolver.path_to_id(file);
        let mtime = match fs::metadata(file).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) => {
                crate::log!("hmr"; "cannot evaluate {}: {}", source_id, e);
                return None;
            }
        };
        let key: ModuleCacheKey = (source_id.clone(), mtime);

        let lease = {
            let mut modules = self.inner.modules.lock();
            let module = modules.entry(key.clone()).or_insert_with(|| {
                let n = self.inner.next_eval.fetch_add(1, Ordering::Relaxed);
                Arc::new(CompiledModule {
                    id: format!("{MODULE_NAMESPACE}:{n}"),
                    ready: OnceCell::new(),
                    refs: AtomicUsize::new(0),
                })
            });
            module.refs.fetch_add(1, Ordering::SeqCst);
            ModuleLease {
                hmr: self,
                key,
                module: Arc::clone(module),
            }
        };

        let module = &lease.module;
        let ready = *module
            .ready
            .get_or_init(|| self.compile_module(source_id, module.id.clone()))
            .await;
        if ready {
            self.request(client, &module.id, &args).await
        } else {
            None
        }
    }

    fn release(&self, key: &ModuleCacheKey, module: &Arc<CompiledModule>) {
        let mut modules = self.inner.modules.lock();
        if module.refs.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        if modules.get(key).is_some_and(|m| Arc::ptr_eq(m, module)) {
            modules.remove(key);
        }
        self.inner.vfs.unset(&module.id);
    }

    /// Build `source_id` through the engine and serve its entry output as
    /// `module_id`. Imported modules are written to the output dir.
    async fn compile_module(&self, source_id: String, module_id: String) -> bool {
        let engine = Arc::clone(&self.inner.engine);
        let entry = source_id.clone();
        let built = tokio::task::spawn_blocking(move || {
            let mut handle = engine.context(BuildOptions {
                entry_points: vec![entry.clone()],
                minify: false,
                write: true,
                label: entry,
            })?;
            let result = handle.rebuild();
            handle.dispose();
            result
        })
        .await;

        let built = match built {
            Ok(Ok(built)) => built,
            Ok(Err(e)) => {
                crate::log!("hmr"; "{}", e);
                return false;
            }
            Err(e) => {
                crate::log!("hmr"; "compile task failed: {}", e);
                return false;
            }
        };

        let out = self.inner.resolver.script_output_path(&source_id);
        let Some(output) = built.output_files.into_iter().find(|f| f.path == out) else {
            crate::log!("hmr"; "no output for {}", source_id);
            return false;
        };
        let code = String::from_utf8_lossy(&output.contents).into_owned();
        self.inner
            .vfs
            .set(&module_id, VirtualFile::fixed(VirtualData::js(code)));
        true
    }

    async fn request(&self, client: ClientId, id: &str, args: &[Value]) -> Option<Value> {
        let request_id = self.inner.next_request.fetch_add(1, Ordering::Relaxed);
        let src = self.module_url(id);
        let text = EvaluateRequest {
            id: request_id,
            src: &src,
            args,
        }
        .to_json();
        let rx = self.inner.clients.request(client, request_id, &text)?;
        rx.await.ok().flatten()
    }
}
