//! Shared helpers for scanner integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use market_structure::{Bar, Bias, OrderBlock};
use parking_lot::Mutex;
use scanner::{OrderBlockSink, OrderBlockUpdate};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
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

pub const MINUTE: i64 = 60_000;

pub fn bar(index: usize, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        open_time: index as i64 * MINUTE,
        close_time: (index as i64 + 1) * MINUTE - 1,
        open: (high + low) / 2.0,
        high,
        low,
        close,
        volume: 1.0,
    }
}

/// Rising market with a higher peak every 4 bars
pub fn staircase(count: usize) -> Vec<Bar> {
    (0..count)
        .map(|i| {
            let base = 2.0 * (i / 4) as f64;
            let (high, low, close) = match i % 4 {
                0 => (base + 1.0, base, base + 0.5),
                1 => (base + 3.0, base + 1.0, base + 2.8),
                2 => (base + 2.5, base + 1.5, base + 2.0),
                _ => (base + 2.2, base + 1.6, base + 1.8),
            };
            bar(i, high, low, close)
        })
        .collect()
}

/// One block whose high is the buffer length and whose time is the tail's
pub fn buffer_summary(bars: &[Bar]) -> Vec<OrderBlock> {
    vec![OrderBlock {
        bar_high: bars.len() as f64,
        bar_low: 0.0,
        bar_time: bars.last().map_or(-1, |b| b.open_time),
        bias: Bias::Bullish,
    }]
}

/// Binance-style kline event for bar `index`
pub fn kline_payload(symbol: &str, interval: &str, index: usize, closed: bool) -> Value {
    let open_time = index as i64 * MINUTE;
    json!({
        "e": "kline",
        "E": open_time + MINUTE,
        "s": symbol,
        "k": {
            "t": open_time, "T": open_time + MINUTE - 1, "s": symbol, "i": interval,
            "o": "100.0", "c": "101.5", "h": "102.0", "l": "99.5",
            "v": "42.0", "n": 10, "x": closed, "q": "4200.0",
            "V": "20.0", "Q": "2000.0", "B": "0"
        }
    })
}

#[derive(Default)]
pub struct RecordingSink {
    pub updates: Mutex<Vec<OrderBlockUpdate>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }
}

#[async_trait]
impl OrderBlockSink for RecordingSink {
    async fn publish(&self, update: &OrderBlockUpdate) {
        self.updates.lock().push(update.clone());
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

/// Combined-stream server that acknowledges every request and publishes on demand
pub struct MockStreamServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    sockets: Arc<Mutex<Vec<mpsc::UnboundedSender<String>>>>,
}

impl MockStreamServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let sockets = Arc::new(Mutex::new(Vec::new()));

        let accept_requests = Arc::clone(&requests);
        let accept_sockets = Arc::clone(&sockets);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let (tx, mut rx) = mpsc::unbounded_channel::<String>();
                accept_sockets.lock().push(tx);
                let requests = Arc::clone(&accept_requests);

                tokio::spawn(async move {
                    let (mut write, mut read) = ws.split();
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let Ok(request) = serde_json::from_str::<Value>(&text) else {
                                        continue;
                                    };
                                    requests.lock().push(request.clone());
                                    let ack = json!({"result": null, "id": request["id"]});
                                    if write.send(Message::Text(ack.to_string())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                            outbound = rx.recv() => match outbound {
                                Some(text) => {
                                    if write.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                None => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            addr,
            requests,
            sockets,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r["method"] == method)
            .cloned()
            .collect()
    }

    pub fn push(&self, stream: &str, data: Value) {
        let text = json!({"stream": stream, "data": data}).to_string();
        self.sockets.lock().retain(|tx| tx.send(text.clone()).is_ok());
    }
}
