//! Unbundled ES module engine.
//!
//! Each handle crawls the static import graph from its entry points and
//! emits one output per module with import specifiers rewritten to output
//! URLs. Scripts keep their module boundaries, which is what lets the dev
//! client swap a single module in place.
//!
//! Non-script imports (stylesheets, images) are copied as-is next to a small
//! ES module shim that exports their URL.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::resolve::{Resolved, resolve_specifier};
use super::scan::{ScanResult, rewrite_imports, scan_imports};
use super::{
    BuildError, BuildHandle, BuildOptions, BuildResult, InputMeta, Metafile, OutputFile,
    OutputMeta, ResolveError, TransformEngine, TransformHook,
};
use crate::core::Resolver;
use crate::core::id::is_virtual;
use crate::utils::hash;
use crate::utils::minify::minify_js;
use crate::vfs::{Loader, VirtualFileStore};

struct Inner {
    resolver: Resolver,
    vfs: Arc<VirtualFileStore>,
    hooks: FxHashMap<Loader, Vec<Arc<dyn TransformHook>>>,
}

/// Engine shared by every bundle of a build context.
#[derive(Clone)]
pub struct ModuleEngine {
    inner: Arc<Inner>,
}

impl ModuleEngine {
    pub fn new(
        resolver: Resolver,
        vfs: Arc<VirtualFileStore>,
        hooks: impl IntoIterator<Item = Arc<dyn TransformHook>>,
    ) -> Self {
        let mut by_loader: FxHashMap<Loader, Vec<Arc<dyn TransformHook>>> = FxHashMap::default();
        for hook in hooks {
            by_loader.entry(hook.loader()).or_default().push(hook);
        }
        Self {
            inner: Arc::new(Inner {
                resolver,
                vfs,
                hooks: by_loader,
            }),
        }
    }
}

impl TransformEngine for ModuleEngine {
    fn context(&self, options: BuildOptions) -> Result<Box<dyn BuildHandle>, BuildError> {
        crate::debug!("engine"; "context {} ({} entries)", options.label, options.entry_points.len());
        Ok(Box::new(ModuleHandle {
            inner: Arc::clone(&self.inner),
            options,
            scans: FxHashMap::default(),
            written: FxHashMap::default(),
        }))
    }

    fn resolve(&self, specifier: &str, importer: &str) -> Result<Resolved, ResolveError> {
        resolve_specifier(&self.inner.resolver, &self.inner.vfs, specifier, importer)
    }
}

/// Raw module contents before transforms.
struct Loaded {
    bytes: Vec<u8>,
    loader: Loader,
    watch_files: Vec<PathBuf>,
    watch_dirs: Vec<PathBuf>,
}

struct CachedScan {
    hash: u64,
    scan: Arc<ScanResult>,
}

struct ModuleHandle {
    inner: Arc<Inner>,
    options: BuildOptions,
    /// Scan results by id, reused while the transformed source is unchanged.
    scans: FxHashMap<String, CachedScan>,
    /// Content hash of every output written by this handle.
    written: FxHashMap<PathBuf, u64>,
}

impl BuildHandle for ModuleHandle {
    fn rebuild(&mut self) -> Result<BuildResult, BuildError> {
        let entries: FxHashSet<String> = self.options.entry_points.iter().cloned().collect();
        let mut queue: VecDeque<String> = self.options.entry_points.iter().cloned().collect();
        let mut seen = FxHashSet::default();
        let mut result = BuildResult::default();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }

            let loaded = self.load(&id)?;
            let mut input = InputMeta {
                watch_files: loaded.watch_files.iter().cloned().collect(),
                watch_dirs: loaded.watch_dirs.iter().cloned().collect(),
                ..InputMeta::default()
            };

            let outputs = match loaded.loader {
                Loader::Js => {
                    let code = self.transformed(&id, loaded.loader, loaded.bytes)?;
                    let js = self.emit_script(&id, &code, &mut input, &mut queue)?;
                    vec![OutputFile {
                        path: self.inner.resolver.script_output_path(&id),
                        contents: js.into_bytes(),
                    }]
                }
                Loader::Css => {
                    let code = self.transformed(&id, loaded.loader, loaded.bytes)?;
                    self.emit_asset(&id, code.into_bytes(), true)
                }
                Loader::File => self.emit_asset(&id, loaded.bytes, false),
            };

            let entry_point = entries.contains(id.as_str()).then(|| id.clone());
            for output in outputs {
                result.metafile.outputs.insert(
                    output.path.clone(),
                    OutputMeta {
                        inputs: [id.clone()].into(),
                        entry_point: entry_point.clone(),
                    },
                );
                result.output_files.push(output);
            }
            result.metafile.inputs.insert(id, input);
        }

        if self.options.write {
            self.write(&result)?;
        }
        crate::debug!("engine"; "built {} ({} modules)", self.options.label, result.metafile.inputs.len());
        Ok(result)
    }
}

impl ModuleHandle {
    fn load(&self, id: &str) -> Result<Loaded, BuildError> {
        if is_virtual(id) {
            let data = self
                .inner
                .vfs
                .resolve(id, None)
                .ok_or_else(|| BuildError::new(id, "virtual module not found"))?;
            return Ok(Loaded {
                bytes: data.code.clone().into_bytes(),
                loader: data.loader,
                watch_files: data.watch_files.clone(),
                watch_dirs: data.watch_dirs.clone(),
            });
        }

        let path = self
            .inner
            .resolver
            .id_to_path(id)
            .ok_or_else(|| BuildError::new(id, "not a file"))?;
        let bytes = fs::read(&path)
            .map_err(|e| BuildError::new(id, format!("cannot read {}: {e}", path.display())))?;
        Ok(Loaded {
            bytes,
            loader: Loader::from_path(&path),
            watch_files: Vec::new(),
            watch_dirs: Vec::new(),
        })
    }

    /// Decode as UTF-8 and run the loader's transform hooks in order.
    fn transformed(&self, id: &str, loader: Loader, bytes: Vec<u8>) -> Result<String, BuildError> {
        let mut code = String::from_utf8(bytes)
            .map_err(|_| BuildError::new(id, format!("{} module is not valid UTF-8", loader.label())))?;
        for hook in self.inner.hooks.get(&loader).into_iter().flatten() {
            match hook.transform(id, &code) {
                Ok(Some(next)) => code = next,
                Ok(None) => {}
                Err(e) => return Err(BuildError::new(id, format!("{e:#}"))),
            }
        }
        Ok(code)
    }

    fn scan(&mut self, id: &str, code: &str) -> Result<Arc<ScanResult>, BuildError> {
        let hash = hash::compute(code.as_bytes());
        if let Some(cached) = self.scans.get(id)
            && cached.hash == hash
        {
            return Ok(Arc::clone(&cached.scan));
        }

        let scan = Arc::new(scan_imports(code).map_err(|message| BuildError::new(id, message))?);
        self.scans.insert(
            id.to_string(),
            CachedScan {
                hash,
                scan: Arc::clone(&scan),
            },
        );
        Ok(scan)
    }

    /// Resolve imports, queue dependencies and rewrite specifiers to output URLs.
    fn emit_script(
        &mut self,
        id: &str,
        code: &str,
        input: &mut InputMeta,
        queue: &mut VecDeque<String>,
    ) -> Result<String, BuildError> {
        let scan = self.scan(id, code)?;
        let resolver = &self.inner.resolver;

        let mut urls: FxHashMap<&str, String> = FxHashMap::default();
        for site in &scan.imports {
            if let Resolved::Id(dep) = resolve_specifier(resolver, &self.inner.vfs, &site.specifier, id)? {
                urls.insert(&site.specifier, resolver.script_output_url(&dep));
                input.imports.insert(dep.clone());
                queue.push_back(dep);
            }
        }
        for reexport in &scan.reexports {
            if let Resolved::Id(owner) = resolve_specifier(resolver, &self.inner.vfs, &reexport.specifier, id)? {
                input
                    .reexports
                    .insert(reexport.name.clone(), (owner, reexport.key.clone()));
            }
        }

        let js = rewrite_imports(code, &scan.imports, |spec| urls.get(spec).cloned());
        if self.options.minify {
            return Ok(minify_js(&js).unwrap_or(js));
        }
        Ok(js)
    }

    /// Copy a non-script module and emit its URL shim.
    fn emit_asset(&self, id: &str, contents: Vec<u8>, stylesheet: bool) -> Vec<OutputFile> {
        let resolver = &self.inner.resolver;
        let url = serde_json::Value::String(resolver.output_url(id)).to_string();
        let shim = if stylesheet {
            format!(
                "const url = {url};\n\
                 if (typeof document !== \"undefined\" && !document.querySelector(`link[href=\"${{url}}\"]`)) {{\n\
                 \x20 const link = document.createElement(\"link\");\n\
                 \x20 link.rel = \"stylesheet\";\n\
                 \x20 link.href = url;\n\
                 \x20 document.head.appendChild(link);\n\
                 }}\n\
                 export default url;\n"
            )
        } else {
            format!("export default {url};\n")
        };

        vec![
            OutputFile {
                path: resolver.output_path(id),
                contents,
            },
            OutputFile {
                path: resolver.script_output_path(id),
                contents: shim.into_bytes(),
            },
        ]
    }

    /// Write outputs whose contents changed since the last write.
    fn write(&mut self, result: &BuildResult) -> Result<(), BuildError> {
        for output in &result.output_files {
            let hash = hash::compute(&output.contents);
            if self.written.get(&output.path) == Some(&hash) && output.path.exists() {
                continue;
            }
            let owner = result
                .metafile
                .outputs
                .get(&output.path)
                .and_then(|meta| meta.inputs.first().cloned())
                .unwrap_or_default();
            let io_error = |e: std::io::Error| {
                BuildError::new(owner.clone(), format!("cannot write {}: {e}", output.path.display()))
            };
            if let Some(parent) = output.path.parent() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
            fs::write(&output.path, &output.contents).map_err(io_error)?;
            self.written.insert(output.path.clone(), hash);
        }
        Ok(())
    }
}
