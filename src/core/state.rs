//! Process-wide serve state.
//!
//! `READY` flips once the initial build has written its output; until then
//! the router answers 503. `STOPPING` flips on Ctrl-C and never resets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use crossbeam::channel::Sender;
use tiny_http::Server;

static READY: AtomicBool = AtomicBool::new(false);

static STOPPING: AtomicBool = AtomicBool::new(false);

/// What the Ctrl-C handler stops when a dev server is running.
struct ShutdownTargets {
    server: Arc<Server>,
    actors: Sender<()>,
}

static TARGETS: OnceLock<ShutdownTargets> = OnceLock::new();

pub fn is_serving() -> bool {
    READY.load(Ordering::Acquire)
}

pub fn set_serving() {
    READY.store(true, Ordering::Release);
}

pub fn is_shutdown() -> bool {
    STOPPING.load(Ordering::Acquire)
}

/// Install the Ctrl-C handler. Call once, before any blocking work.
///
/// Without a registered server the process exits at once; with one, the
/// request loop is unblocked and the actors are told to dispose.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(on_interrupt).context("failed to set Ctrl+C handler")
}

fn on_interrupt() {
    STOPPING.store(true, Ordering::Release);

    let Some(targets) = TARGETS.get() else {
        std::process::exit(130);
    };
    crate::log!("serve"; "shutting down...");
    let _ = targets.actors.send(());
    targets.server.unblock();
}

/// Register the dev server so Ctrl-C shuts it down gracefully.
///
/// Only the first registration counts.
pub fn register_server(server: Arc<Server>, actors: Sender<()>) {
    let _ = TARGETS.set(ShutdownTargets { server, actors });
}
