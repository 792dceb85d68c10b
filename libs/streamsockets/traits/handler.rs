//! Channel payload handlers
//!
//! Handlers run inline on the connection's read loop, in socket arrival
//! order. Anything slow should be handed off (spawn a task or push into a
//! channel) so other channels on the same connection are not held up.

use serde_json::Value;

/// Receives every payload published on a subscribed channel
pub trait ChannelHandler: Send + Sync + 'static {
    fn handle(&self, channel: &str, payload: &Value);
}

impl<F> ChannelHandler for F
where
    F: Fn(&str, &Value) + Send + Sync + 'static,
{
    fn handle(&self, channel: &str, payload: &Value) {
        self(channel, payload)
    }
}

/// Identifies one registered handler on a connection
pub type HandlerId = u64;
