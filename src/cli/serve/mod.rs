//! Development server with hot module reload.
//!
//! ```text
//! main thread:  tiny_http ──> rayon pool ──> Router::handle
//! actor thread: initial build ──> Coordinator (FsActor + Orchestrator)
//! ws threads:   accept loop + reader loop (hmr::start_ws_server)
//! ```
//!
//! Requests that arrive before the initial build finishes get a 503.

mod lifecycle;
mod path;
mod response;


use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use percent_encoding::percent_decode_str;
use tiny_http::{Method, Request, Server};

use crate::actor::FsActor;
use crate::actor::fs::collect_watch_roots;
use crate::bundle::collect_entries;
use crate::config::cfg;
use crate::core::id::FS_PREFIX;
use crate::core::{Resolver, is_serving, is_shutdown, register_server};
use crate::embed::serve::{CLIENT_JS, CLIENT_PATH, ClientVars, REGISTRY_PATH};
use crate::hmr::{ClientSet, Hmr, ModuleRegistry, start_ws_server};
use crate::plugin::Plugins;
use crate::related::{NotifyBackend, RelatedWatcher};
use crate::session::BuildContext;
use crate::utils::mime::{
    self,
    types::{CSS, JAVASCRIPT, JSON},
};
use crate::vfs::{self, Loader, VirtualFileStore};
use crate::{debug, log};

use lifecycle::ActorSetup;
use path::{has_traversal, resolve_path, resolve_within};
use response::{
    respond_bytes, respond_file, respond_method_not_allowed, respond_not_found,
    respond_unavailable,
};

/// Worker threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;

/// Start the dev server for the installed config and block until shutdown.
pub fn serve(plugins: Plugins) -> Result<()> {
    let config = cfg();
    let resolver = config.resolver();
    let mut entries = collect_entries(&config)?;
    entries.extend(plugins.extra_entries(&resolver, config.webext()));

    let roots = collect_watch_roots(&config, &entries);
    let fs = FsActor::new(roots.clone(), vec![resolver.out_dir().to_path_buf()])
        .context("failed to start the file watcher")?;
    let related = Arc::new(RelatedWatcher::new(Box::new(NotifyBackend::new(
        fs.watcher(),
        roots,
    ))));
    let ctx = BuildContext::new(
        resolver.clone(),
        config.mode(),
        config.env_mode(),
        related,
        plugins,
    )?;

    let interface = config.serve.interface;
    let (server, addr) = lifecycle::bind_with_retry(interface, config.serve.port)?;
    let server = Arc::new(server);

    let clients = ClientSet::new();
    let ws_port = start_ws_server(interface, addr.port().saturating_add(1), Arc::clone(&clients))?;
    debug!("hmr"; "ws://{}:{}", host(addr), ws_port);

    let origin = format!("http://{}:{}", host(addr), addr.port());
    let hmr = Hmr::new(
        clients,
        Arc::clone(&ctx.vfs),
        resolver,
        Arc::clone(&ctx.engine),
        origin.as_str(),
    );

    let mut allow = vec![config.get_root().to_path_buf()];
    allow.extend(config.serve.allow.iter().map(|dir| config.root_join(dir)));
    let router = Arc::new(Router::new(&ctx, config.assets_dir(), allow, ws_port));

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);
    log!("serve"; "{}", origin);

    let actors = lifecycle::spawn_actors(
        ActorSetup {
            ctx,
            entries,
            fs,
            hmr,
            config_path: config.config_path.clone(),
        },
        shutdown_rx,
    );
    run_request_loop(&server, &router)?;
    lifecycle::wait_for_shutdown(actors);
    Ok(())
}

/// Host part of URLs handed to browsers; wildcard binds are reached via localhost.
fn host(addr: SocketAddr) -> String {
    match addr {
        _ if addr.ip().is_unspecified() => "localhost".to_string(),
        SocketAddr::V6(v6) => format!("[{}]", v6.ip()),
        SocketAddr::V4(v4) => v4.ip().to_string(),
    }
}

fn run_request_loop(server: &Server, router: &Arc<Router>) -> Result<()> {
    // Requests that read large files must not block the client script.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let router = Arc::clone(router);
        pool.spawn(move || {
            if let Err(e) = router.handle(request) {
                debug!("serve"; "request error: {:#}", e);
            }
        });
    }
    Ok(())
}

// ============================================================================
// Router
// ============================================================================

/// Answers GET/HEAD requests.
///
/// Order: plugin serve hooks, the dev client and registry, the virtual file
/// store, then the output dir, the assets dir and `/@fs/` paths.
pub struct Router {
    resolver: Resolver,
    plugins: Plugins,
    vfs: Arc<VirtualFileStore>,
    registry: Arc<ModuleRegistry>,
    assets: PathBuf,
    /// Directories `/@fs/` may read from.
    fs_allow: Vec<PathBuf>,
    ws_port: u16,
}

impl Router {
    pub fn new(ctx: &BuildContext, assets: PathBuf, fs_allow: Vec<PathBuf>, ws_port: u16) -> Self {
        Self {
            resolver: ctx.resolver.clone(),
            plugins: ctx.plugins.clone(),
            vfs: Arc::clone(&ctx.vfs),
            registry: Arc::clone(&ctx.registry),
            assets,
            fs_allow,
            ws_port,
        }
    }

    pub fn handle(&self, request: Request) -> Result<()> {
        if is_shutdown() {
            return respond_unavailable(request);
        }
        if !matches!(request.method(), Method::Get | Method::Head) {
            return respond_method_not_allowed(request);
        }

        let url = request.url().to_string();
        let parsed = vfs::Request::parse(&url);

        for hook in self.plugins.serves() {
            if let Some(res) = hook.handle(&parsed) {
                return respond_bytes(request, res.status, &res.content_type, res.body);
            }
        }

        let path = url.split(['?', '#']).next().unwrap_or(&url);
        if path == CLIENT_PATH {
            let body = CLIENT_JS.render(&ClientVars { ws_port: self.ws_port });
            return respond_bytes(request, 200, JAVASCRIPT, body.into_bytes());
        }
        if path == REGISTRY_PATH {
            return respond_bytes(request, 200, JSON, self.registry.to_json().into_bytes());
        }

        if !is_serving() {
            return respond_unavailable(request);
        }

        let id = self.resolver.uri_to_id(&url);
        if let Some(data) = self.vfs.resolve(&id, Some(&parsed)) {
            let content_type = match data.loader {
                Loader::Js => JAVASCRIPT,
                Loader::Css => CSS,
                Loader::File => mime::from_path(Path::new(&id)),
            };
            return respond_bytes(request, 200, content_type, data.code.clone().into_bytes());
        }

        match self.resolve_file(path) {
            Some(file) => respond_file(request, &file),
            None => respond_not_found(request),
        }
    }

    fn resolve_file(&self, path: &str) -> Option<PathBuf> {
        if path.starts_with(FS_PREFIX) {
            if has_traversal(&percent_decode_str(path).decode_utf8_lossy()) {
                return None;
            }
            let file = self.resolver.id_to_path(&self.resolver.uri_to_id(path))?;
            let allowed: Vec<&Path> = self.fs_allow.iter().map(PathBuf::as_path).collect();
            return resolve_within(&file, &allowed);
        }

        resolve_path(path, self.resolver.out_dir()).or_else(|| resolve_path(path, &self.assets))
    }
}
