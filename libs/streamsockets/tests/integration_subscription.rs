//! Integration tests for subscribe/unsubscribe on a single connection

mod common;

use common::{collector, wait_until, MockStreamServer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use streamsockets::{ChannelHandler, StreamConfig, StreamConnection, StreamError};

fn test_config(url: String) -> Arc<StreamConfig> {
    Arc::new(
        StreamConfig::new(url)
            .with_subscribe_timeout(Duration::from_secs(1))
            .with_reconnect_delay(Duration::from_millis(50)),
    )
}

async fn connected(server: &MockStreamServer) -> Arc<StreamConnection> {
    let connection = StreamConnection::spawn(0, test_config(server.ws_url()));
    tokio::time::timeout(Duration::from_secs(5), connection.wait_connected())
        .await
        .expect("connect timed out")
        .expect("connect failed");
    connection
}

#[tokio::test]
async fn test_subscribe_waits_for_ack() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let (_received, handler) = collector();

    let handler_id = connection
        .subscribe("btcusdt@kline_1m", Arc::new(handler))
        .await
        .unwrap();
    verbose_println!("handler id {}", handler_id);

    assert!(connection.is_subscribed("btcusdt@kline_1m"));
    assert_eq!(connection.handler_count("btcusdt@kline_1m"), 1);

    let subscribes = server.requests_with_method("SUBSCRIBE");
    assert_eq!(subscribes.len(), 1);
    assert_eq!(subscribes[0]["params"], json!(["btcusdt@kline_1m"]));
    assert!(subscribes[0]["id"].is_u64());

    connection.shutdown().await;
}

#[tokio::test]
async fn test_payloads_fan_out_to_every_handler() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let (first, first_handler) = collector();
    let (second, second_handler) = collector();

    connection
        .subscribe("ethusdt@kline_5m", Arc::new(first_handler))
        .await
        .unwrap();
    connection
        .subscribe("ethusdt@kline_5m", Arc::new(second_handler))
        .await
        .unwrap();

    // Second handler is added locally
    assert_eq!(server.requests_with_method("SUBSCRIBE").len(), 1);
    assert_eq!(connection.handler_count("ethusdt@kline_5m"), 2);

    server.push("ethusdt@kline_5m", json!({"k": {"c": "1.5"}}));
    assert!(wait_until(Duration::from_secs(2), || first.lock().len() == 1
        && second.lock().len() == 1)
    .await);
    assert_eq!(first.lock()[0].0, "ethusdt@kline_5m");
    assert_eq!(second.lock()[0].1["k"]["c"], "1.5");

    connection.shutdown().await;
}

#[tokio::test]
async fn test_payloads_keep_arrival_order() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let (received, handler) = collector();
    connection
        .subscribe("btcusdt@kline_1m", Arc::new(handler))
        .await
        .unwrap();

    for seq in 0..50 {
        server.push("btcusdt@kline_1m", json!({"seq": seq}));
    }
    assert!(wait_until(Duration::from_secs(2), || received.lock().len() == 50).await);
    let seqs: Vec<u64> = received
        .lock()
        .iter()
        .map(|(_, payload)| payload["seq"].as_u64().unwrap())
        .collect();
    assert_eq!(seqs, (0..50).collect::<Vec<u64>>());

    connection.shutdown().await;
}

#[tokio::test]
async fn test_unsubscribe_only_after_last_handler() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let before = connection.subscribed_channels();

    let (_a, handler_a) = collector();
    let (_b, handler_b) = collector();
    let first = connection
        .subscribe("solusdt@kline_1m", Arc::new(handler_a))
        .await
        .unwrap();
    let second = connection
        .subscribe("solusdt@kline_1m", Arc::new(handler_b))
        .await
        .unwrap();

    connection.unsubscribe("solusdt@kline_1m", first).unwrap();
    assert!(connection.is_subscribed("solusdt@kline_1m"));

    connection.unsubscribe("solusdt@kline_1m", second).unwrap();
    assert!(!connection.is_subscribed("solusdt@kline_1m"));
    assert_eq!(connection.subscribed_channels(), before);

    assert!(
        wait_until(Duration::from_secs(2), || server
            .requests_with_method("UNSUBSCRIBE")
            .len()
            == 1)
        .await
    );
    assert_eq!(server.requests_with_method("SUBSCRIBE").len(), 1);

    // Unknown handler ids are ignored
    connection.unsubscribe("solusdt@kline_1m", second).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.requests_with_method("UNSUBSCRIBE").len(), 1);

    connection.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_times_out_without_ack() {
    let server = MockStreamServer::start().await;
    server.set_silent(true);
    let config = Arc::new(
        StreamConfig::new(server.ws_url()).with_subscribe_timeout(Duration::from_millis(200)),
    );
    let connection = StreamConnection::spawn(0, config);
    connection.wait_connected().await.unwrap();

    let (_received, handler) = collector();
    let result = connection
        .subscribe("btcusdt@kline_1m", Arc::new(handler))
        .await;

    assert!(matches!(result, Err(StreamError::Timeout(_))));
    assert!(!connection.is_subscribed("btcusdt@kline_1m"));
    assert_eq!(connection.handler_count("btcusdt@kline_1m"), 0);

    connection.shutdown().await;
}

#[tokio::test]
async fn test_error_ack_rejects_subscribe() {
    let server = MockStreamServer::start().await;
    server.reject_channel("bogus@kline_1m");
    let connection = connected(&server).await;

    let (_received, handler) = collector();
    let result = connection.subscribe("bogus@kline_1m", Arc::new(handler)).await;

    assert_eq!(
        result,
        Err(StreamError::Rejected("Invalid request".to_string()))
    );
    assert!(!connection.is_subscribed("bogus@kline_1m"));

    connection.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frame_is_dropped_not_fatal() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let (received, handler) = collector();
    connection
        .subscribe("btcusdt@kline_1m", Arc::new(handler))
        .await
        .unwrap();

    server.push_raw("this is not json");
    server.push("btcusdt@kline_1m", json!({"ok": true}));

    assert!(wait_until(Duration::from_secs(2), || received.lock().len() == 1).await);
    assert!(connection.is_connected());
    assert_eq!(connection.metrics().reconnect_count, 0);

    connection.shutdown().await;
}

#[tokio::test]
async fn test_subscribe_after_shutdown_fails() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    connection.shutdown().await;

    let handler: Arc<dyn ChannelHandler> = Arc::new(|_: &str, _: &serde_json::Value| {});
    let result = connection.subscribe("btcusdt@kline_1m", handler).await;
    assert_eq!(result, Err(StreamError::Shutdown));
    assert!(connection.wait_connected().await.is_err());
}

#[tokio::test]
async fn test_concurrent_first_subscribes_send_one_request() {
    let server = MockStreamServer::start().await;
    server.delay_acks(Duration::from_millis(100));
    let connection = connected(&server).await;
    let (_a, handler_a) = collector();
    let (_b, handler_b) = collector();

    let (first, second) = tokio::join!(
        connection.subscribe("xrpusdt@kline_1m", Arc::new(handler_a)),
        connection.subscribe("xrpusdt@kline_1m", Arc::new(handler_b)),
    );

    assert_ne!(first.unwrap(), second.unwrap());
    assert_eq!(server.requests_with_method("SUBSCRIBE").len(), 1);
    assert_eq!(connection.handler_count("xrpusdt@kline_1m"), 2);
    assert_eq!(connection.pending_requests(), 0);

    connection.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_subscribe_racing_last_unsubscribe_stays_consistent() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;

    for round in 0..50 {
        let channel = format!("round{}@kline_1m", round);
        let (_a, handler_a) = collector();
        let first = connection
            .subscribe(&channel, Arc::new(handler_a))
            .await
            .unwrap();

        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let unsubscriber = {
            let connection = Arc::clone(&connection);
            let barrier = Arc::clone(&barrier);
            let channel = channel.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                connection.unsubscribe(&channel, first).unwrap();
            })
        };
        let (_b, handler_b) = collector();
        barrier.wait().await;
        let second = connection.subscribe(&channel, Arc::new(handler_b)).await;
        unsubscriber.await.unwrap();

        verbose_println!("round {}: {:?}", round, second);
        assert!(second.is_ok());
        assert_eq!(connection.handler_count(&channel), 1);
        assert!(connection.is_subscribed(&channel));
    }

    connection.shutdown().await;
}

#[tokio::test]
async fn test_late_ack_is_undone_with_unsubscribe() {
    let server = MockStreamServer::start().await;
    server.delay_acks(Duration::from_millis(400));
    let config = Arc::new(
        StreamConfig::new(server.ws_url()).with_subscribe_timeout(Duration::from_millis(150)),
    );
    let connection = StreamConnection::spawn(0, config);
    connection.wait_connected().await.unwrap();

    let (_received, handler) = collector();
    let result = connection
        .subscribe("adausdt@kline_1m", Arc::new(handler))
        .await;
    assert!(matches!(result, Err(StreamError::Timeout(_))));

    assert!(
        wait_until(Duration::from_secs(2), || server
            .requests_with_method("UNSUBSCRIBE")
            .iter()
            .any(|r| r["params"] == json!(["adausdt@kline_1m"])))
        .await
    );
    assert!(!connection.is_subscribed("adausdt@kline_1m"));
    assert!(wait_until(Duration::from_secs(2), || connection.pending_requests() == 0).await);

    connection.shutdown().await;
}

#[tokio::test]
async fn test_unacked_unsubscribe_expires() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let (_received, handler) = collector();
    let handler_id = connection
        .subscribe("dogeusdt@kline_1m", Arc::new(handler))
        .await
        .unwrap();

    server.set_silent(true);
    connection.unsubscribe("dogeusdt@kline_1m", handler_id).unwrap();
    assert_eq!(connection.pending_requests(), 1);

    assert!(wait_until(Duration::from_secs(4), || connection.pending_requests() == 0).await);
    assert!(connection.is_connected());

    connection.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_drops_unacked_requests() {
    let server = MockStreamServer::start().await;
    let connection = connected(&server).await;
    let (_received, handler) = collector();
    let handler_id = connection
        .subscribe("bnbusdt@kline_1m", Arc::new(handler))
        .await
        .unwrap();

    server.set_silent(true);
    connection.unsubscribe("bnbusdt@kline_1m", handler_id).unwrap();
    assert_eq!(connection.pending_requests(), 1);

    server.drop_connections();
    assert!(wait_until(Duration::from_millis(500), || connection.pending_requests() == 0).await);

    connection.shutdown().await;
}
