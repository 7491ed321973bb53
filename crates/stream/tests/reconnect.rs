//! Connection manager against a loopback websocket server

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use tokenfeed_core::FeedConfig;
use tokenfeed_stream::TokenFeed;

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}

fn feed_config(addr: std::net::SocketAddr) -> FeedConfig {
    FeedConfig {
        url: format!("ws://{}", addr),
        reconnect_delay_ms: 100,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_subscribes_and_forwards_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subscribed_tx, mut subscribed_rx) = mpsc::channel::<Value>(4);

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        if let Some(Ok(Message::Text(text))) = ws.next().await {
            subscribed_tx.send(serde_json::from_str(&text).unwrap()).await.unwrap();
        }

        ws.send(Message::Text("{not json".into())).await.unwrap();
        for i in 0..25 {
            let frame = json!({ "txType": "create", "mint": format!("mint-{}", i) });
            ws.send(Message::Text(frame.to_string())).await.unwrap();
        }

        // hold the socket open until the client goes away
        while let Some(Ok(_)) = ws.next().await {}
    });

    let feed = TokenFeed::new(feed_config(addr));
    let status = feed.status();
    let (frames_tx, mut frames_rx) = mpsc::channel(64);
    assert!(feed.start(frames_tx));

    let subscribe = within(subscribed_rx.recv()).await.unwrap();
    assert_eq!(subscribe, json!({ "method": "subscribeNewToken" }));

    for i in 0..25 {
        let frame = within(frames_rx.recv()).await.unwrap();
        assert_eq!(frame.payload["mint"], format!("mint-{}", i));
    }

    assert!(status.is_connected());
    assert_eq!(status.last_error(), None);

    let trail = status.raw_trail();
    assert_eq!(trail.len(), 20);
    assert_eq!(trail[0].payload["mint"], "mint-24");
    assert_eq!(trail[19].payload["mint"], "mint-5");

    feed.stop().await;
    assert!(!status.is_connected());
    within(server).await.unwrap();
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (subscribed_tx, mut subscribed_rx) = mpsc::channel::<(u32, Instant)>(4);
    let (closed_tx, closed_rx) = oneshot::channel::<Instant>();

    tokio::spawn(async move {
        let mut closed_tx = Some(closed_tx);
        for session in 1..=2u32 {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            if let Some(Ok(Message::Text(_))) = ws.next().await {
                subscribed_tx.send((session, Instant::now())).await.unwrap();
            }

            if let Some(closed_tx) = closed_tx.take() {
                let _ = closed_tx.send(Instant::now());
                ws.close(None).await.unwrap();
            }
            while let Some(Ok(_)) = ws.next().await {}
        }
    });

    let config = feed_config(addr);
    let reconnect_delay = config.reconnect_delay();
    let feed = TokenFeed::new(config);
    let status = feed.status();
    let (frames_tx, _frames_rx) = mpsc::channel(8);
    feed.start(frames_tx);

    assert_eq!(within(subscribed_rx.recv()).await.map(|(session, _)| session), Some(1));
    let closed_at = within(closed_rx).await.unwrap();
    // second session re-sends the subscribe command
    let (session, resubscribed_at) = within(subscribed_rx.recv()).await.unwrap();
    assert_eq!(session, 2);
    assert!(
        resubscribed_at.duration_since(closed_at) >= reconnect_delay,
        "reconnected after {:?}, expected at least {:?}",
        resubscribed_at.duration_since(closed_at),
        reconnect_delay
    );

    wait_until("reconnected", || status.is_connected()).await;
    assert!(status.stats().reconnects >= 1);
    assert_eq!(status.last_error(), None);

    feed.stop().await;
}

#[tokio::test]
async fn test_connection_failure_surfaces_error_and_retries() {
    // bind then release a port so nothing is listening on it
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let feed = TokenFeed::new(feed_config(addr));
    let status = feed.status();
    let (frames_tx, _frames_rx) = mpsc::channel(8);
    feed.start(frames_tx);

    wait_until("two failed attempts", || status.stats().reconnects >= 2).await;
    assert!(!status.is_connected());
    assert!(status.last_error().is_some());
    assert!(feed.is_running());

    feed.stop().await;
    assert!(!feed.is_running());
}
