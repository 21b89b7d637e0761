//! Server lifecycle management.

use std::net::{IpAddr, SocketAddr};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam::channel::Receiver;
use tiny_http::Server;

use crate::actor::{Coordinator, FsActor, Orchestrator};
use crate::bundle::Entry;
use crate::core::set_serving;
use crate::hmr::Hmr;
use crate::logger::status_errors;
use crate::session::{BuildContext, BuildSession};
use crate::utils::plural_count;
use crate::log;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Bind to the specified interface and port, with automatic port retry.
pub fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..MAX_PORT_RETRIES {
        let addr = SocketAddr::new(interface, base_port.saturating_add(offset));
        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                // Port 0 asks the OS; report the port actually bound.
                let bound = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, bound));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Everything the actor thread needs to take over after binding.
pub struct ActorSetup {
    pub ctx: BuildContext,
    pub entries: Vec<Entry>,
    pub fs: FsActor,
    pub hmr: Hmr,
    pub config_path: std::path::PathBuf,
}

/// Spawn the thread that runs the initial build and then the watch actors.
pub fn spawn_actors(setup: ActorSetup, shutdown_rx: Receiver<()>) -> JoinHandle<()> {
    thread::spawn(move || run_actor_system(setup, shutdown_rx))
}

fn run_actor_system(setup: ActorSetup, shutdown_rx: Receiver<()>) {
    let ActorSetup {
        ctx,
        entries,
        fs,
        hmr,
        config_path,
    } = setup;

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log!("actor"; "failed to create tokio runtime: {}", e);
            return;
        }
    };

    let mut session = BuildSession::new(&entries, &ctx.resolver);
    let errors = session.build_all(&ctx);
    if errors.is_empty() {
        log!(
            "build";
            "{}, {}",
            plural_count(session.documents.len(), "document"),
            plural_count(session.bundle_count(), "bundle")
        );
    } else {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        status_errors("initial build failed", messages.iter().map(String::as_str));
    }
    set_serving();

    let orchestrator = Orchestrator::new(ctx, session, hmr).with_config_path(config_path);
    rt.block_on(async {
        let coordinator = Coordinator::new(fs, orchestrator).with_shutdown_signal(shutdown_rx);
        if let Err(e) = coordinator.run().await {
            log!("actor"; "error: {}", e);
        }
    });
}

/// Wait for the actor system to shut down gracefully (max 2 seconds).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    crate::debug!("actor"; "shutdown timed out");
}
