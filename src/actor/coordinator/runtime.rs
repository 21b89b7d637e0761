use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::pass::Orchestrator;
use crate::actor::fs::FsActor;
use crate::actor::messages::BuildMsg;

const CHANNEL_BUFFER: usize = 32;

/// Wait for the build actor to dispose its handles after a shutdown.
const DISPOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Serve passes until shutdown, then dispose the session.
async fn build_loop(mut orchestrator: Orchestrator, mut rx: mpsc::Receiver<BuildMsg>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            BuildMsg::Pass { changes, done } => {
                orchestrator.run_pass(&changes).await;
                let _ = done.send(());
            }
            BuildMsg::Shutdown => break,
        }
    }
    orchestrator.dispose();
    crate::debug!("actor"; "build handles disposed");
}

/// Run both actors until a shutdown signal (or until either stops).
pub(super) async fn run_actors(
    fs: FsActor,
    orchestrator: Orchestrator,
    shutdown_rx: Option<Receiver<()>>,
) -> Result<()> {
    let (build_tx, build_rx) = mpsc::channel::<BuildMsg>(CHANNEL_BUFFER);

    let build_handle = tokio::spawn(build_loop(orchestrator, build_rx));
    let fs_tx = build_tx.clone();
    let fs_handle = tokio::spawn(async move { fs.run(fs_tx).await });

    if let Some(rx) = shutdown_rx {
        loop {
            if rx.try_recv().is_ok() || crate::core::is_shutdown() {
                crate::debug!("actor"; "shutdown signal received");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    } else {
        let _ = fs_handle.await;
    }

    let _ = build_tx.send(BuildMsg::Shutdown).await;
    let _ = tokio::time::timeout(DISPOSE_TIMEOUT, build_handle).await;
    Ok(())
}
