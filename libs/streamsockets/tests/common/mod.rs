//! Common test utilities for streamsockets integration tests
//!
//! `MockStreamServer` speaks the combined-stream protocol: it acknowledges
//! SUBSCRIBE/UNSUBSCRIBE requests, records every request it receives, pushes
//! payloads on demand and can drop all sockets to force a reconnect.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamsockets::ChannelHandler;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

enum ServerCommand {
    Send(String),
    Drop,
}

#[derive(Default)]
struct ServerState {
    requests: Mutex<Vec<Value>>,
    connections: Mutex<Vec<mpsc::UnboundedSender<ServerCommand>>>,
    accepted: AtomicUsize,
    /// Stop acknowledging requests
    silent: AtomicBool,
    /// Channels answered with an error acknowledgment
    rejected: Mutex<HashSet<String>>,
    /// Hold every acknowledgment back this long
    ack_delay: Mutex<Option<Duration>>,
}

pub struct MockStreamServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Arc<Notify>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        Self::start_at("127.0.0.1:0".parse().unwrap()).await
    }

    /// Listen on a fixed address, e.g. one a client is already dialing
    pub async fn start_at(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());
        let shutdown = Arc::new(Notify::new());

        let accept_state = Arc::clone(&state);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let state = Arc::clone(&accept_state);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_shutdown.notified() => break,
                }
            }
        });

        Self {
            addr,
            state,
            shutdown,
        }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, state: Arc<ServerState>) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        state.accepted.fetch_add(1, Ordering::SeqCst);

        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        state.connections.lock().push(command_tx.clone());
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(request) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };
                            state.requests.lock().push(request.clone());
                            if state.silent.load(Ordering::SeqCst) {
                                continue;
                            }
                            let id = request["id"].clone();
                            let rejected = request["params"]
                                .as_array()
                                .map(|params| {
                                    let rejected = state.rejected.lock();
                                    params.iter().any(|p| {
                                        p.as_str().map_or(false, |p| rejected.contains(p))
                                    })
                                })
                                .unwrap_or(false);
                            let ack = if rejected {
                                json!({"error": {"code": 2, "msg": "Invalid request"}, "id": id})
                            } else {
                                json!({"result": null, "id": id})
                            };
                            let delay = *state.ack_delay.lock();
                            if let Some(delay) = delay {
                                let delayed_tx = command_tx.clone();
                                tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    let _ = delayed_tx.send(ServerCommand::Send(ack.to_string()));
                                });
                            } else if write.send(Message::Text(ack.to_string())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(ServerCommand::Send(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Drop) | None => break,
                    }
                }
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().clone()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r["method"] == method)
            .collect()
    }

    /// Sockets accepted over the server's lifetime
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    pub fn delay_acks(&self, delay: Duration) {
        *self.state.ack_delay.lock() = Some(delay);
    }

    pub fn reject_channel(&self, channel: &str) {
        self.state.rejected.lock().insert(channel.to_string());
    }

    /// Publish `data` on `stream` to every open socket
    pub fn push(&self, stream: &str, data: Value) {
        self.push_raw(json!({"stream": stream, "data": data}).to_string());
    }

    pub fn push_raw(&self, text: impl Into<String>) {
        let text = text.into();
        self.state
            .connections
            .lock()
            .retain(|tx| tx.send(ServerCommand::Send(text.clone())).is_ok());
    }

    /// Drop every socket without a close handshake
    pub fn drop_connections(&self) {
        for tx in self.state.connections.lock().drain(..) {
            let _ = tx.send(ServerCommand::Drop);
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockStreamServer {
    fn drop(&mut self) {
        self.drop_connections();
        self.shutdown();
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub type Received = Arc<Mutex<Vec<(String, Value)>>>;

/// Handler that records every payload it is given
pub fn collector() -> (Received, impl ChannelHandler) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let handler = move |channel: &str, payload: &Value| {
        sink.lock().push((channel.to_string(), payload.clone()));
    };
    (received, handler)
}
