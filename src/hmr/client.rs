//! Connected browser clients.
//!
//! Every tab holds one WebSocket. The set is shared between the reader
//! thread, the orchestrator and plugins; plugins only list clients and
//! subscribe to their events.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use super::message::{self, ClientMessage};

pub type ClientId = u64;

/// Callback for a custom client event.
pub type Listener = Arc<dyn Fn(ClientId, &Value) + Send + Sync>;

struct Client {
    id: ClientId,
    ws: WebSocket<TcpStream>,
    /// Evaluation requests awaiting a result.
    pending: FxHashMap<u64, oneshot::Sender<Option<Value>>>,
    listeners: FxHashMap<String, Vec<Listener>>,
}

impl Client {
    /// Send a text frame. `false` when the socket is gone.
    fn send(&mut self, text: &str) -> bool {
        match self.ws.send(Message::Text(text.into())) {
            Ok(()) => true,
            Err(WsError::Io(e)) if e.kind() == ErrorKind::WouldBlock => true,
            Err(e) => {
                crate::debug!("hmr"; "client {} disconnected: {}", self.id, e);
                false
            }
        }
    }
}

/// A client event to dispatch after the set is unlocked.
struct Dispatch {
    client: ClientId,
    payload: Value,
    listeners: Vec<Listener>,
}

#[derive(Default)]
pub struct ClientSet {
    clients: Mutex<Vec<Client>>,
    next_id: AtomicU64,
    /// Listeners for events from any client.
    global: RwLock<FxHashMap<String, Vec<Listener>>>,
}

impl ClientSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adopt a socket after its handshake and greet it.
    pub fn add(&self, mut ws: WebSocket<TcpStream>) -> Option<ClientId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = ws.send(Message::Text(message::connected().into())) {
            crate::log!("hmr"; "failed to greet client: {}", e);
            return None;
        }
        let _ = ws.get_ref().set_nonblocking(true);

        let mut clients = self.clients.lock();
        clients.push(Client {
            id,
            ws,
            pending: FxHashMap::default(),
            listeners: FxHashMap::default(),
        });
        crate::debug!("hmr"; "client {} connected (total: {})", id, clients.len());
        Some(id)
    }

    /// Ids of the connected clients.
    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.lock().iter().map(|c| c.id).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Listen for `event` from one client. `false` when it is gone.
    pub fn on(&self, client: ClientId, event: &str, listener: Listener) -> bool {
        let mut clients = self.clients.lock();
        let Some(client) = clients.iter_mut().find(|c| c.id == client) else {
            return false;
        };
        client
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
        true
    }

    /// Listen for `event` from every client.
    pub fn subscribe(&self, event: &str, listener: Listener) {
        self.global
            .write()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Send a text frame to one client.
    pub fn send(&self, client: ClientId, text: &str) -> bool {
        let mut clients = self.clients.lock();
        let Some(index) = clients.iter().position(|c| c.id == client) else {
            return false;
        };
        if clients[index].send(text) {
            return true;
        }
        clients.remove(index);
        false
    }

    /// Send a text frame to every client; returns how many received it.
    pub fn broadcast(&self, text: &str) -> usize {
        let mut clients = self.clients.lock();
        clients.retain_mut(|client| client.send(text));
        clients.len()
    }

    /// Register a pending request and send it. The receiver yields `None`
    /// when the client disconnects first.
    pub(super) fn request(
        &self,
        client: ClientId,
        request_id: u64,
        text: &str,
    ) -> Option<oneshot::Receiver<Option<Value>>> {
        let mut clients = self.clients.lock();
        let index = clients.iter().position(|c| c.id == client)?;
        let (tx, rx) = oneshot::channel();
        clients[index].pending.insert(request_id, tx);
        if !clients[index].send(text) {
            clients.remove(index);
        }
        Some(rx)
    }

    /// Drain readable frames from every client without blocking.
    ///
    /// Results complete their pending request; custom events go to the
    /// client's listeners and the global ones. Closed clients are dropped,
    /// which resolves their pending requests to `None`.
    pub fn poll(&self) {
        let mut dispatches = Vec::new();
        {
            let mut clients = self.clients.lock();
            let global = self.global.read();
            clients.retain_mut(|client| {
                loop {
                    match client.ws.read() {
                        Ok(Message::Text(text)) => {
                            handle_text(client, text.as_str(), &global, &mut dispatches);
                        }
                        Ok(Message::Close(_)) => return false,
                        Ok(_) => {}
                        Err(WsError::Io(e)) if e.kind() == ErrorKind::WouldBlock => return true,
                        Err(e) => {
                            crate::debug!("hmr"; "client {} closed: {}", client.id, e);
                            return false;
                        }
                    }
                }
            });
        }

        for dispatch in dispatches {
            for listener in &dispatch.listeners {
                listener(dispatch.client, &dispatch.payload);
            }
        }
    }

    /// Close every socket.
    pub fn close_all(&self) {
        let mut clients = self.clients.lock();
        for mut client in clients.drain(..) {
            let _ = client.ws.close(None);
            let _ = client.ws.flush();
        }
    }
}

fn handle_text(
    client: &mut Client,
    text: &str,
    global: &FxHashMap<String, Vec<Listener>>,
    dispatches: &mut Vec<Dispatch>,
) {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::Result { id, result, error }) => {
            if let Some(error) = error {
                crate::debug!("hmr"; "client {} evaluation {} failed: {}", client.id, id, error);
            }
            if let Some(tx) = client.pending.remove(&id) {
                let _ = tx.send(Some(result));
            }
        }
        Ok(ClientMessage::Custom { kind, payload }) => {
            let listeners: Vec<Listener> = client
                .listeners
                .get(&kind)
                .into_iter()
                .chain(global.get(&kind))
                .flatten()
                .cloned()
                .collect();
            if !listeners.is_empty() {
                dispatches.push(Dispatch {
                    client: client.id,
                    payload,
                    listeners,
                });
            }
        }
        Err(e) => crate::log!("hmr"; "malformed message from client {}: {}", client.id, e),
    }
}
