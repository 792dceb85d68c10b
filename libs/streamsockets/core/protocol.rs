//! Wire envelopes for the combined-stream protocol
//!
//! Outbound: `{"method":"SUBSCRIBE","params":["btcusdt@kline_1m"],"id":1}`.
//! Inbound is either an acknowledgment `{"result":null,"id":1}` (or
//! `{"error":{..},"id":1}`) or a payload `{"stream":"btcusdt@kline_1m","data":{..}}`.

use crate::traits::{Result, StreamError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Subscribe,
    Unsubscribe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub method: Method,
    pub params: Vec<String>,
    pub id: u64,
}

impl StreamRequest {
    pub fn subscribe(params: Vec<String>, id: u64) -> Self {
        Self {
            method: Method::Subscribe,
            params,
            id,
        }
    }

    pub fn unsubscribe(params: Vec<String>, id: u64) -> Self {
        Self {
            method: Method::Unsubscribe,
            params,
            id,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StreamError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<u64>,
    error: Option<Value>,
    stream: Option<String>,
    data: Option<Value>,
}

/// Decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Acknowledgment of request `id`, with the server's error if it refused
    Ack { id: u64, error: Option<String> },
    /// Payload published on `stream`
    Payload { stream: String, data: Value },
    /// Valid JSON of neither shape
    Other,
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self> {
        let frame: RawFrame =
            serde_json::from_str(text).map_err(|e| StreamError::Parse(e.to_string()))?;

        if let Some(id) = frame.id {
            let error = frame.error.filter(|e| !e.is_null()).map(|e| match e {
                Value::Object(ref map) => map
                    .get("msg")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string()),
                other => other.to_string(),
            });
            return Ok(Inbound::Ack { id, error });
        }

        match (frame.stream, frame.data) {
            (Some(stream), Some(data)) => Ok(Inbound::Payload { stream, data }),
            _ => Ok(Inbound::Other),
        }
    }
}
