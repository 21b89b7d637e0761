//! Watch-mode wiring: filesystem events in, rebuild passes out.

mod classify;
mod pass;
mod plan;
mod runtime;

#[cfg(test)]
mod tests;

pub use classify::{ChangeSet, classify};
pub use pass::{Orchestrator, PassReport, unlink};
pub use plan::{Reload, decide_reload};

use anyhow::Result;
use crossbeam::channel::Receiver;

use super::fs::FsActor;

pub struct Coordinator {
    fs: FsActor,
    orchestrator: Orchestrator,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(fs: FsActor, orchestrator: Orchestrator) -> Self {
        Self {
            fs,
            orchestrator,
            shutdown_rx: None,
        }
    }

    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Runs until shutdown is signalled or the watcher goes away.
    pub async fn run(self) -> Result<()> {
        crate::debug!("watch"; "watching for changes");
        runtime::run_actors(self.fs, self.orchestrator, self.shutdown_rx).await?;
        crate::debug!("watch"; "stopped");
        Ok(())
    }
}
