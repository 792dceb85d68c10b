//! One physical stream socket carrying many channels
//!
//! ```text
//! subscribe() ──> outbound queue ──> socket task ──> server
//!                                        │
//!            handlers <── fan-out <── read loop <── {stream, data}
//!            pending  <── resolve <──            <── {id, result}
//! ```
//!
//! The socket task owns the WebSocket and reconnects on its own. After every
//! reconnect it re-issues one batched SUBSCRIBE for the channels that were
//! live before the drop, so handlers keep receiving without any caller
//! involvement.

use crate::config::StreamConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::protocol::{Inbound, StreamRequest};
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Timeouts an abandoned subscribe keeps listening for a late ack
const LATE_ACK_WINDOW: u32 = 4;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// Caller blocked on a SUBSCRIBE ack
struct Waiter {
    handler_id: HandlerId,
    handler: Arc<dyn ChannelHandler>,
    responder: oneshot::Sender<Result<()>>,
}

/// Request waiting for its acknowledgment
enum PendingRequest {
    /// Concurrent subscribes to one channel share a single request
    Subscribe { channel: String, waiters: Vec<Waiter> },
    /// Every waiter timed out. A late success is undone with UNSUBSCRIBE.
    Abandoned { channel: String, expires: Instant },
    Resubscribe { channels: usize, expires: Instant },
    Unsubscribe { channel: String, expires: Instant },
}

impl PendingRequest {
    /// Subscribe entries are owned by their callers and never expire here
    fn expires(&self) -> Option<Instant> {
        match self {
            Self::Subscribe { .. } => None,
            Self::Abandoned { expires, .. }
            | Self::Resubscribe { expires, .. }
            | Self::Unsubscribe { expires, .. } => Some(*expires),
        }
    }
}

/// Outcome of the synchronous half of a subscribe
pub(crate) enum Registration {
    /// Channel was live, handler added locally
    Live(HandlerId),
    Waiting {
        request_id: u64,
        handler_id: HandlerId,
        response: oneshot::Receiver<Result<()>>,
    },
}

/// State shared between the socket task and the public handle
///
/// Lock order is `subscribed`, then `handlers`, then `pending`.
struct Shared {
    id: usize,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    next_request_id: AtomicU64,
    next_handler_id: AtomicU64,
    /// Channels acknowledged by the server
    subscribed: RwLock<HashSet<String>>,
    handlers: RwLock<HashMap<String, Vec<(HandlerId, Arc<dyn ChannelHandler>)>>>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    /// How long a non-subscribe request waits for its ack
    ack_timeout: Duration,
    /// Pool slots claimed by subscribes still waiting for an ack
    reserved: AtomicUsize,
    outbound: mpsc::UnboundedSender<Message>,
    connected: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    fn new(id: usize, ack_timeout: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (connected_tx, _) = watch::channel(false);
        let (shutdown_tx, _) = watch::channel(false);

        let shared = Arc::new(Self {
            id,
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            metrics: AtomicMetrics::new(),
            next_request_id: AtomicU64::new(0),
            next_handler_id: AtomicU64::new(0),
            subscribed: RwLock::new(HashSet::new()),
            handlers: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            ack_timeout,
            reserved: AtomicUsize::new(0),
            outbound: outbound_tx,
            connected: connected_tx,
            shutdown: shutdown_tx,
        });
        (shared, outbound_rx)
    }

    fn request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn ack_deadline(&self) -> Instant {
        Instant::now() + self.ack_timeout
    }

    fn send(&self, request: &StreamRequest) -> Result<()> {
        let text = request.to_json()?;
        self.outbound
            .send(Message::Text(text))
            .map_err(|e| StreamError::ChannelSend(e.to_string()))
    }

    /// Queue an UNSUBSCRIBE. Callers hold `subscribed` for writing so no
    /// SUBSCRIBE for the same channel can be queued ahead of it.
    fn send_unsubscribe(&self, channel: &str) -> Result<()> {
        let id = self.request_id();
        self.pending.lock().insert(
            id,
            PendingRequest::Unsubscribe {
                channel: channel.to_string(),
                expires: self.ack_deadline(),
            },
        );
        if let Err(e) = self.send(&StreamRequest::unsubscribe(vec![channel.to_string()], id)) {
            self.pending.lock().remove(&id);
            return Err(e);
        }
        self.metrics.increment_sent();
        debug!("[Stream:{}] UNSUBSCRIBE {} (id {})", self.id, channel, id);
        Ok(())
    }

    fn is_subscribing(&self, channel: &str) -> bool {
        self.pending.lock().values().any(|request| {
            matches!(request, PendingRequest::Subscribe { channel: c, .. } if c == channel)
        })
    }

    fn handle_text(&self, text: &str) {
        match Inbound::parse(text) {
            Ok(Inbound::Ack { id, error }) => self.resolve(id, error),
            Ok(Inbound::Payload { stream, data }) => self.dispatch(&stream, &data),
            Ok(Inbound::Other) => debug!("[Stream:{}] Ignoring frame: {}", self.id, text),
            Err(e) => warn!("[Stream:{}] Dropping malformed frame: {}", self.id, e),
        }
    }

    fn resolve(&self, id: u64, error: Option<String>) {
        let mut subscribed = self.subscribed.write();
        let mut handlers = self.handlers.write();
        let Some(request) = self.pending.lock().remove(&id) else {
            debug!("[Stream:{}] Ack for unknown request {}", self.id, id);
            return;
        };

        match request {
            PendingRequest::Subscribe { channel, waiters } => {
                if let Some(reason) = error {
                    for waiter in waiters {
                        let _ = waiter
                            .responder
                            .send(Err(StreamError::Rejected(reason.clone())));
                    }
                    return;
                }

                // Callers are released before their handler is visible, but
                // any unsubscribe they issue waits on the locks held here
                let mut registered = Vec::with_capacity(waiters.len());
                for waiter in waiters {
                    if waiter.responder.send(Ok(())).is_ok() {
                        registered.push((waiter.handler_id, waiter.handler));
                    }
                }
                if registered.is_empty() {
                    debug!("[Stream:{}] Every caller for {} is gone", self.id, channel);
                    if let Err(e) = self.send_unsubscribe(&channel) {
                        warn!("[Stream:{}] Could not undo {}: {}", self.id, channel, e);
                    }
                    return;
                }
                subscribed.insert(channel.clone());
                handlers.entry(channel.clone()).or_default().extend(registered);
                info!("[Stream:{}] Subscribed to {}", self.id, channel);
            }
            PendingRequest::Abandoned { channel, .. } => {
                if error.is_some() || subscribed.contains(&channel) || self.is_subscribing(&channel)
                {
                    return;
                }
                info!(
                    "[Stream:{}] Late ack for {}, unsubscribing",
                    self.id, channel
                );
                if let Err(e) = self.send_unsubscribe(&channel) {
                    warn!("[Stream:{}] Could not undo {}: {}", self.id, channel, e);
                }
            }
            PendingRequest::Resubscribe { channels, .. } => match error {
                Some(reason) => {
                    error!("[Stream:{}] Resubscribe rejected: {}", self.id, reason)
                }
                None => info!("[Stream:{}] Resubscribed {} channels", self.id, channels),
            },
            PendingRequest::Unsubscribe { channel, .. } => match error {
                Some(reason) => warn!(
                    "[Stream:{}] Unsubscribe from {} rejected: {}",
                    self.id, channel, reason
                ),
                None => debug!("[Stream:{}] Unsubscribed from {}", self.id, channel),
            },
        }
    }

    /// Take `handler_id` off its pending subscribe. False if the ack already
    /// resolved it.
    fn withdraw(&self, request_id: u64, handler_id: HandlerId) -> bool {
        let mut pending = self.pending.lock();
        let Some(PendingRequest::Subscribe { channel, waiters }) = pending.get_mut(&request_id)
        else {
            return false;
        };
        let before = waiters.len();
        waiters.retain(|waiter| waiter.handler_id != handler_id);
        if waiters.len() == before {
            return false;
        }
        if waiters.is_empty() {
            let channel = std::mem::take(channel);
            let expires = Instant::now() + self.ack_timeout * LATE_ACK_WINDOW;
            pending.insert(request_id, PendingRequest::Abandoned { channel, expires });
        }
        true
    }

    /// Drop requests whose ack window has passed
    fn expire_stale_requests(&self) {
        let now = Instant::now();
        let mut pending = self.pending.lock();
        pending.retain(|id, request| match request.expires() {
            Some(expires) if expires <= now => {
                debug!("[Stream:{}] Request {} expired without ack", self.id, id);
                false
            }
            _ => true,
        });
    }

    /// Acks for everything but subscribes can only arrive on the closed socket.
    /// Subscribes stay so a frame still queued goes out on the next socket.
    fn expire_session_requests(&self) {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, request| matches!(request, PendingRequest::Subscribe { .. }));
        if pending.len() < before {
            debug!(
                "[Stream:{}] Dropped {} requests from the closed session",
                self.id,
                before - pending.len()
            );
        }
    }

    fn dispatch(&self, channel: &str, data: &Value) {
        let handlers: Vec<Arc<dyn ChannelHandler>> = match self.handlers.read().get(channel) {
            Some(handlers) => handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            None => {
                debug!("[Stream:{}] No handler for {}", self.id, channel);
                return;
            }
        };
        for handler in handlers {
            handler.handle(channel, data);
        }
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Resolve once `flag` is raised. The watch guard is released before this
/// returns, so callers can hold the result across awaits.
async fn raised(flag: &mut watch::Receiver<bool>) -> bool {
    flag.wait_for(|raised| *raised).await.is_ok()
}

/// Claim on one channel slot of a connection, released on drop
pub struct SlotReservation {
    shared: Arc<Shared>,
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        self.shared.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Handle to one pooled socket
pub struct StreamConnection {
    shared: Arc<Shared>,
    config: Arc<StreamConfig>,
    task_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StreamConnection {
    /// Spawn the socket task and return immediately. Must be called inside a
    /// tokio runtime. Use [`wait_connected`](Self::wait_connected) to block
    /// until the first connection is up.
    pub fn spawn(id: usize, config: Arc<StreamConfig>) -> Arc<Self> {
        let (shared, outbound_rx) = Shared::new(id, config.subscribe_timeout);

        let strategy: Box<dyn ReconnectionStrategy> = Box::new(FixedDelay::new(
            config.reconnect_delay,
            config.max_reconnect_attempts,
        ));

        let task_handle = {
            let shared = Arc::clone(&shared);
            let config = Arc::clone(&config);
            tokio::spawn(async move {
                run_connection(shared, config, strategy, outbound_rx).await;
            })
        };

        Arc::new(Self {
            shared,
            config,
            task_handle: Mutex::new(Some(task_handle)),
        })
    }

    #[inline]
    pub fn id(&self) -> usize {
        self.shared.id
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    /// Resolve once the socket is connected
    pub async fn wait_connected(&self) -> Result<()> {
        let mut connected = self.shared.connected.subscribe();
        let mut shutdown = self.shared.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(StreamError::Shutdown);
        }
        tokio::select! {
            up = raised(&mut connected) => {
                if up { Ok(()) } else { Err(StreamError::Shutdown) }
            }
            _ = raised(&mut shutdown) => Err(StreamError::Shutdown),
        }
    }

    /// Register `handler` for `channel`.
    ///
    /// A channel that is already live only gets the handler added locally.
    /// A channel with a SUBSCRIBE in flight joins that request. Otherwise a
    /// SUBSCRIBE is sent and the handler is registered when the server
    /// acknowledges it; no ack within the subscribe timeout fails with
    /// [`StreamError::Timeout`] and leaves the channel unsubscribed.
    pub async fn subscribe(
        &self,
        channel: &str,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<HandlerId> {
        let registration = self.register(channel, handler)?;
        self.complete(channel, registration).await
    }

    /// Synchronous half of [`subscribe`](Self::subscribe). Once this returns
    /// the channel is either live or has a SUBSCRIBE in flight.
    pub(crate) fn register(
        &self,
        channel: &str,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<Registration> {
        if self.shared.is_shutting_down() {
            return Err(StreamError::Shutdown);
        }
        let handler_id = self.shared.next_handler_id.fetch_add(1, Ordering::Relaxed) + 1;

        let subscribed = self.shared.subscribed.read();
        if subscribed.contains(channel) {
            self.shared
                .handlers
                .write()
                .entry(channel.to_string())
                .or_default()
                .push((handler_id, handler));
            debug!(
                "[Stream:{}] Added local handler {} for {}",
                self.id(),
                handler_id,
                channel
            );
            return Ok(Registration::Live(handler_id));
        }

        let (responder, response) = oneshot::channel();
        let waiter = Waiter {
            handler_id,
            handler,
            responder,
        };
        let mut pending = self.shared.pending.lock();
        let inflight = pending.iter().find_map(|(id, request)| match request {
            PendingRequest::Subscribe { channel: c, .. } if c == channel => Some(*id),
            _ => None,
        });

        if let Some(request_id) = inflight {
            if let Some(PendingRequest::Subscribe { waiters, .. }) = pending.get_mut(&request_id) {
                waiters.push(waiter);
            }
            debug!(
                "[Stream:{}] Joined in-flight SUBSCRIBE {} (id {})",
                self.id(),
                channel,
                request_id
            );
            return Ok(Registration::Waiting {
                request_id,
                handler_id,
                response,
            });
        }

        let request_id = self.shared.request_id();
        pending.insert(
            request_id,
            PendingRequest::Subscribe {
                channel: channel.to_string(),
                waiters: vec![waiter],
            },
        );
        if let Err(e) = self
            .shared
            .send(&StreamRequest::subscribe(vec![channel.to_string()], request_id))
        {
            pending.remove(&request_id);
            return Err(e);
        }
        self.shared.metrics.increment_sent();
        debug!("[Stream:{}] SUBSCRIBE {} (id {})", self.id(), channel, request_id);
        Ok(Registration::Waiting {
            request_id,
            handler_id,
            response,
        })
    }

    /// Wait out a registration from [`register`](Self::register)
    pub(crate) async fn complete(
        &self,
        channel: &str,
        registration: Registration,
    ) -> Result<HandlerId> {
        let (request_id, handler_id, mut response) = match registration {
            Registration::Live(handler_id) => return Ok(handler_id),
            Registration::Waiting {
                request_id,
                handler_id,
                response,
            } => (request_id, handler_id, response),
        };

        let waited = tokio::time::timeout(self.config.subscribe_timeout, &mut response).await;
        let outcome = match waited {
            Ok(outcome) => outcome.ok(),
            Err(_) if self.shared.withdraw(request_id, handler_id) => {
                warn!("[Stream:{}] Subscribe to {} timed out", self.id(), channel);
                return Err(StreamError::Timeout(format!("subscribe to {}", channel)));
            }
            // Ack landed as the timer fired
            Err(_) => response.try_recv().ok(),
        };

        match outcome {
            Some(Ok(())) => Ok(handler_id),
            Some(Err(e)) => {
                warn!("[Stream:{}] Subscribe to {} failed: {}", self.id(), channel, e);
                Err(e)
            }
            None => Err(StreamError::ConnectionClosed(
                "pending subscribe dropped".to_string(),
            )),
        }
    }

    /// Remove one handler. The UNSUBSCRIBE goes out only when the last handler
    /// for the channel is removed. Unknown ids are a no-op.
    pub fn unsubscribe(&self, channel: &str, handler_id: HandlerId) -> Result<()> {
        let mut subscribed = self.shared.subscribed.write();
        let mut handlers = self.shared.handlers.write();
        let Some(registered) = handlers.get_mut(channel) else {
            return Ok(());
        };
        let before = registered.len();
        registered.retain(|(id, _)| *id != handler_id);
        if registered.len() == before || !registered.is_empty() {
            return Ok(());
        }

        handlers.remove(channel);
        subscribed.remove(channel);
        self.shared.send_unsubscribe(channel)
    }

    /// True while a SUBSCRIBE for `channel` awaits its ack
    pub fn is_subscribing(&self, channel: &str) -> bool {
        self.shared.is_subscribing(channel)
    }

    /// Requests still waiting for an acknowledgment
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.lock().len()
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.shared.subscribed.read().contains(channel)
    }

    pub fn subscribed_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.shared.subscribed.read().iter().cloned().collect();
        channels.sort();
        channels
    }

    pub fn channel_count(&self) -> usize {
        self.shared.subscribed.read().len()
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        self.shared
            .handlers
            .read()
            .get(channel)
            .map_or(0, |handlers| handlers.len())
    }

    /// Live channels plus slots reserved by in-flight subscribes
    pub fn load(&self) -> usize {
        self.channel_count() + self.shared.reserved.load(Ordering::Acquire)
    }

    /// Claim a slot so concurrent pool lookups see this connection as fuller
    pub fn reserve_slot(&self) -> SlotReservation {
        self.shared.reserved.fetch_add(1, Ordering::AcqRel);
        SlotReservation {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.shared.metrics.messages_sent(),
            messages_received: self.shared.metrics.messages_received(),
            reconnect_count: self.shared.metrics.reconnect_count(),
            connection_state: self.shared.state.get(),
        }
    }

    /// Close the socket and stop reconnecting
    pub async fn shutdown(&self) {
        info!("[Stream:{}] Shutting down", self.id());
        self.shared.state.set(ConnectionState::ShuttingDown);
        self.shared.shutdown.send_replace(true);

        let handle = self.task_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.shared.pending.lock().clear();
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state.get())
            .field("channels", &self.channel_count())
            .finish()
    }
}

/// Socket task: connect, run the session, wait, repeat
async fn run_connection(
    shared: Arc<Shared>,
    config: Arc<StreamConfig>,
    strategy: Box<dyn ReconnectionStrategy>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
) {
    let mut reconnect_attempt = 0;
    let mut shutdown = shared.shutdown.subscribe();

    loop {
        if *shutdown.borrow() {
            break;
        }

        shared.state.set(if reconnect_attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });

        let connection_result = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            _ = raised(&mut shutdown) => break,
        };

        match connection_result {
            Ok((ws_stream, _)) => {
                info!("[Stream:{}] Connected to {}", shared.id, config.url);
                shared.state.set(ConnectionState::Connected);
                reconnect_attempt = 0;

                if let Err(e) = run_session(ws_stream, &shared, &mut outbound_rx).await {
                    warn!("[Stream:{}] Connection lost: {}", shared.id, e);
                }
                shared.expire_session_requests();

                shared.connected.send_replace(false);
                if !shared.state.is_shutting_down() {
                    shared.state.set(ConnectionState::Disconnected);
                }
            }
            Err(e) => {
                error!("[Stream:{}] Failed to connect: {}", shared.id, e);
                shared.state.set(ConnectionState::Disconnected);
            }
        }

        if *shutdown.borrow() {
            break;
        }

        let Some(delay) = strategy.next_delay(reconnect_attempt) else {
            warn!("[Stream:{}] Reconnection attempts exhausted, stopping", shared.id);
            break;
        };
        info!(
            "[Stream:{}] Reconnecting in {:?} (attempt {})",
            shared.id,
            delay,
            reconnect_attempt + 1
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = raised(&mut shutdown) => break,
        }
        reconnect_attempt += 1;
        shared.metrics.increment_reconnects();
    }

    shared.connected.send_replace(false);
    info!("[Stream:{}] Connection task exiting", shared.id);
}

/// One live socket: resubscribe, release waiters, then pump both directions
async fn run_session(
    ws_stream: WsStream,
    shared: &Arc<Shared>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Message>,
) -> Result<()> {
    let (mut write, mut read) = ws_stream.split();
    let mut shutdown = shared.shutdown.subscribe();

    // Queued ahead of anything sent while disconnected
    if let Some(batch) = resubscribe_frame(shared)? {
        write
            .send(batch)
            .await
            .map_err(|e| StreamError::WebSocket(format!("Failed to resubscribe: {}", e)))?;
        shared.metrics.increment_sent();
    }
    shared.connected.send_replace(true);

    let mut sweep = tokio::time::interval(shared.ack_timeout.max(Duration::from_millis(10)));
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        shared.metrics.increment_received();
                        shared.handle_text(&text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        shared.metrics.increment_received();
                        match std::str::from_utf8(&data) {
                            Ok(text) => shared.handle_text(text),
                            Err(_) => warn!("[Stream:{}] Dropping non-UTF-8 binary frame", shared.id),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return Err(StreamError::ConnectionClosed(format!("{:?}", frame)));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = write.close().await;
                        return Err(StreamError::WebSocket(e.to_string()));
                    }
                    None => {
                        return Err(StreamError::ConnectionClosed("Stream ended".into()));
                    }
                }
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        write.send(msg).await.map_err(|e| StreamError::WebSocket(e.to_string()))?;
                    }
                    None => {
                        debug!("[Stream:{}] Outbound queue closed", shared.id);
                        let _ = write.close().await;
                        return Ok(());
                    }
                }
            }

            _ = sweep.tick() => shared.expire_stale_requests(),

            _ = raised(&mut shutdown) => {
                debug!("[Stream:{}] Shutdown requested, closing socket", shared.id);
                let _ = write.close().await;
                return Ok(());
            }
        }
    }
}

/// Register the batched resubscribe and return its frame, if anything was live
fn resubscribe_frame(shared: &Shared) -> Result<Option<Message>> {
    let channels: Vec<String> = shared.subscribed.read().iter().cloned().collect();
    if channels.is_empty() {
        return Ok(None);
    }
    let id = shared.request_id();
    shared.pending.lock().insert(
        id,
        PendingRequest::Resubscribe {
            channels: channels.len(),
            expires: shared.ack_deadline(),
        },
    );
    info!(
        "[Stream:{}] Resubscribing {} channels (id {})",
        shared.id,
        channels.len(),
        id
    );
    let text = StreamRequest::subscribe(channels, id).to_json()?;
    Ok(Some(Message::Text(text)))
}
