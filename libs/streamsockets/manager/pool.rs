use crate::config::StreamConfig;
use crate::connection::StreamConnection;
use crate::template::expand_template;
use crate::traits::{ChannelHandler, HandlerId, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Live subscription returned by [`StreamPoolManager::subscribe`]
#[derive(Debug)]
pub struct StreamSubscription {
    connection: Arc<StreamConnection>,
    channel: String,
    handler_id: HandlerId,
    active: AtomicBool,
}

impl StreamSubscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn connection_id(&self) -> usize {
        self.connection.id()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove this subscription's handler. Calling it again is a no-op.
    pub fn unsubscribe(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.connection.unsubscribe(&self.channel, self.handler_id)
    }
}

/// Spreads channel subscriptions over as few sockets as the per-connection
/// cap allows
///
/// Connection selection for a channel, in order:
/// 1. the connection already carrying that exact channel, or subscribing to it
/// 2. any connection below `max_channels_per_connection`
/// 3. a new connection, once its first connect completes
pub struct StreamPoolManager {
    config: Arc<StreamConfig>,
    connections: tokio::sync::Mutex<Vec<Arc<StreamConnection>>>,
    next_id: AtomicUsize,
}

impl StreamPoolManager {
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connections: tokio::sync::Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Expand `template` with `params` and register `handler` on the channel
    pub async fn subscribe<H>(
        &self,
        template: &str,
        params: &[(&str, &str)],
        handler: H,
    ) -> Result<StreamSubscription>
    where
        H: ChannelHandler,
    {
        let channel = expand_template(template, params)?;
        self.subscribe_channel(&channel, Arc::new(handler)).await
    }

    pub async fn subscribe_channel(
        &self,
        channel: &str,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<StreamSubscription> {
        let (connection, registration, _reservation) = {
            let mut connections = self.connections.lock().await;

            let (connection, reservation) = if let Some(existing) = connections
                .iter()
                .find(|c| c.is_subscribed(channel) || c.is_subscribing(channel))
            {
                (Arc::clone(existing), None)
            } else if let Some(open) = connections
                .iter()
                .find(|c| c.load() < self.config.max_channels_per_connection)
            {
                let reservation = open.reserve_slot();
                (Arc::clone(open), Some(reservation))
            } else {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                info!(
                    "[StreamPool] Opening connection {} ({} in pool)",
                    id,
                    connections.len()
                );
                let connection = StreamConnection::spawn(id, Arc::clone(&self.config));
                connection.wait_connected().await?;
                let reservation = connection.reserve_slot();
                connections.push(Arc::clone(&connection));
                (connection, Some(reservation))
            };

            // Registered under the pool lock so a concurrent subscribe to the
            // same channel finds it in flight
            let registration = connection.register(channel, handler)?;
            (connection, registration, reservation)
        };

        debug!(
            "[StreamPool] {} -> connection {}",
            channel,
            connection.id()
        );
        let handler_id = connection.complete(channel, registration).await?;
        Ok(StreamSubscription {
            connection,
            channel: channel.to_string(),
            handler_id,
            active: AtomicBool::new(true),
        })
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn connections(&self) -> Vec<Arc<StreamConnection>> {
        self.connections.lock().await.clone()
    }

    /// Total live channels across the pool
    pub async fn channel_count(&self) -> usize {
        self.connections
            .lock()
            .await
            .iter()
            .map(|c| c.channel_count())
            .sum()
    }

    /// Close every connection; later subscribes open fresh ones
    pub async fn shutdown(&self) {
        let connections: Vec<_> = self.connections.lock().await.drain(..).collect();
        info!("[StreamPool] Shutting down {} connections", connections.len());
        for connection in connections {
            connection.shutdown().await;
        }
    }
}

impl std::fmt::Debug for StreamPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPoolManager")
            .field("url", &self.config.url)
            .finish()
    }
}
