//! HMR transport.
//!
//! ```text
//! orchestrator ──> Hmr::evaluate(client, expr) ──> weft-eval:<n> (vfs)
//!                        │                               ▲
//!                        ▼                               │ GET
//!                  ClientSet ──{id, src, args}──> browser ┘
//!                        ▲                               │
//!                        └──{type:"result", id, result}──┘
//! ```
//!
//! Everything the browser runs is an ES module served by the dev server;
//! the socket only carries module URLs and results.

mod client;
mod evaluate;
pub mod message;
mod registry;
mod server;


pub use client::{ClientId, ClientSet, Listener};
pub use evaluate::{EVAL_NAMESPACE, MODULE_NAMESPACE};
pub use registry::{ModuleKey, ModuleRegistry, ReexportError, ReexportTable};
pub use server::start_ws_server;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::SystemTime;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::bundle::engine::TransformEngine;
use crate::core::Resolver;
use crate::vfs::VirtualFileStore;

/// Cache key of a compiled module: source id and modification time.
type ModuleCacheKey = (String, SystemTime);

struct HmrInner {
    clients: Arc<ClientSet>,
    vfs: Arc<VirtualFileStore>,
    resolver: Resolver,
    engine: Arc<dyn TransformEngine>,
    /// `http://host:port` of the dev server.
    origin: String,
    next_eval: AtomicU64,
    next_request: AtomicU64,
    modules: Mutex<FxHashMap<ModuleCacheKey, Arc<evaluate::CompiledModule>>>,
}

/// Handle to the HMR transport, cheap to clone.
#[derive(Clone)]
pub struct Hmr {
    inner: Arc<HmrInner>,
}

impl Hmr {
    pub fn new(
        clients: Arc<ClientSet>,
        vfs: Arc<VirtualFileStore>,
        resolver: Resolver,
        engine: Arc<dyn TransformEngine>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(HmrInner {
                clients,
                vfs,
                resolver,
                engine,
                origin: origin.into().trim_end_matches('/').to_string(),
                next_eval: AtomicU64::new(0),
                next_request: AtomicU64::new(0),
                modules: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Connected clients, for listing and event subscription.
    pub fn clients(&self) -> &ClientSet {
        &self.inner.clients
    }

    /// Push a custom event to every client.
    pub fn broadcast(&self, kind: &str, payload: &serde_json::Value) -> usize {
        self.inner.clients.broadcast(&message::custom(kind, payload))
    }

    /// Absolute URL under which the dev server serves `id`.
    fn module_url(&self, id: &str) -> String {
        format!("{}{}", self.inner.origin, self.inner.resolver.id_to_uri(id))
    }
}
