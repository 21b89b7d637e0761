//! WebSocket server for the dev client.
//!
//! An acceptor thread performs handshakes and hands sockets to the
//! [`ClientSet`]; a reader thread polls the set every 100ms.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use super::ClientSet;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bind the WebSocket port (retrying upward) and start serving `clients`.
///
/// Returns the bound port.
pub fn start_ws_server(interface: IpAddr, base_port: u16, clients: Arc<ClientSet>) -> Result<u16> {
    let (listener, port) = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
    if port != base_port && base_port != 0 {
        crate::log!("hmr"; "port {} in use, using {} instead", base_port, port);
    }
    listener.set_nonblocking(true)?;

    let acceptor = Arc::clone(&clients);
    thread::spawn(move || accept_loop(&listener, &acceptor));
    thread::spawn(move || reader_loop(&clients));

    Ok(port)
}

fn accept_loop(listener: &TcpListener, clients: &ClientSet) {
    while !crate::core::is_shutdown() {
        match listener.accept() {
            Ok((stream, addr)) => {
                crate::debug!("hmr"; "connection from {}", addr);
                // Handshake in blocking mode; the set switches to non-blocking.
                let _ = stream.set_nonblocking(false);
                match tungstenite::accept(stream) {
                    Ok(ws) => {
                        clients.add(ws);
                    }
                    Err(e) => crate::log!("hmr"; "handshake failed: {}", e),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                crate::log!("hmr"; "accept error: {}", e);
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

fn reader_loop(clients: &ClientSet) {
    while !crate::core::is_shutdown() {
        thread::sleep(POLL_INTERVAL);
        clients.poll();
    }
    clients.close_all();
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
