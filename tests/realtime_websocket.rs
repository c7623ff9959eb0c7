//! Realtime channel integration tests
//!
//! Drives `RealtimeChannel` over a real WebSocket served by a local
//! tokio-tungstenite server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use url::Url;

use order_dashboard::application::realtime::{
    Backoff, ChannelState, ChannelUpdate, RealtimeChannel, RetryPolicy,
};
use order_dashboard::domain::errors::ChannelError;
use order_dashboard::infrastructure::WebSocketConnector;

/// What the server does with one accepted connection
struct Script {
    messages: Vec<Message>,
    keep_open: bool,
}

/// Serve scripts to successive connections, counting accepted connections.
async fn spawn_ws_server(scripts: Vec<Script>) -> (Url, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/ws/realtime", listener.local_addr().unwrap())).unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        let mut scripts = scripts.into_iter();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let script = match scripts.next() {
                Some(script) => script,
                None => break,
            };

            let mut ws = accept_async(stream).await.unwrap();
            for message in script.messages {
                ws.send(message).await.unwrap();
            }

            if script.keep_open {
                tokio::spawn(async move { while let Some(Ok(_)) = ws.next().await {} });
            } else {
                let _ = ws.close(None).await;
            }
        }
    });

    (url, accepted)
}

fn frame(orders_per_minute: u32) -> Message {
    Message::Text(format!(
        r#"{{"current_orders_per_minute": {}, "recent_orders": [{{"orderId": "o-{}", "totalAmount": 25.00, "eventType": "ORDER_CREATED"}}]}}"#,
        orders_per_minute, orders_per_minute
    ))
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(50),
        backoff: Backoff::Fixed,
    }
}

async fn next_rate(updates: &mut mpsc::UnboundedReceiver<ChannelUpdate>) -> Decimal {
    loop {
        match timeout(Duration::from_secs(5), updates.recv()).await {
            Ok(Some(ChannelUpdate::Stats(stats))) => return stats.orders_per_minute,
            Ok(Some(ChannelUpdate::Error(_))) => continue,
            other => panic!("expected stats, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn frames_arrive_in_order_and_malformed_ones_are_skipped() {
    let (url, accepted) = spawn_ws_server(vec![Script {
        messages: vec![
            frame(1),
            frame(2),
            Message::Text("{not json".to_string()),
            Message::Binary(br#"{"recent_orders": []}"#.to_vec()),
            frame(3),
        ],
        keep_open: true,
    }])
    .await;

    let channel = RealtimeChannel::new(Arc::new(WebSocketConnector::new(url)), RetryPolicy::default());
    let mut updates = channel.updates();
    channel.connect();

    assert_eq!(next_rate(&mut updates).await, dec!(1));
    assert_eq!(next_rate(&mut updates).await, dec!(2));
    assert_eq!(next_rate(&mut updates).await, dec!(3));

    assert_eq!(channel.state(), ChannelState::Connected);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    channel.disconnect();
    let mut status = channel.watch_status();
    status
        .wait_for(|status| status.state == ChannelState::Closed)
        .await
        .unwrap();
}

#[tokio::test]
async fn reconnects_after_server_closes_the_stream() {
    let (url, accepted) = spawn_ws_server(vec![
        Script {
            messages: vec![frame(1)],
            keep_open: false,
        },
        Script {
            messages: vec![frame(2)],
            keep_open: true,
        },
    ])
    .await;

    let channel = RealtimeChannel::new(Arc::new(WebSocketConnector::new(url)), fast_policy(5));
    let mut updates = channel.updates();
    channel.connect();

    assert_eq!(next_rate(&mut updates).await, dec!(1));
    assert_eq!(next_rate(&mut updates).await, dec!(2));
    assert_eq!(accepted.load(Ordering::SeqCst), 2);

    let mut status = channel.watch_status();
    status
        .wait_for(|status| status.state == ChannelState::Connected)
        .await
        .unwrap();
    assert_eq!(channel.status().consecutive_failures, 0);
}

#[tokio::test]
async fn unreachable_server_exhausts_the_retry_budget() {
    // Reserve a port and release it so connections are refused
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/ws/realtime", listener.local_addr().unwrap())).unwrap();
    drop(listener);

    let channel = RealtimeChannel::new(Arc::new(WebSocketConnector::new(url)), fast_policy(3));
    let mut updates = channel.updates();
    channel.connect();

    let mut transport_errors = 0;
    loop {
        match timeout(Duration::from_secs(5), updates.recv()).await {
            Ok(Some(ChannelUpdate::Error(ChannelError::Transport(_)))) => transport_errors += 1,
            Ok(Some(ChannelUpdate::Error(ChannelError::Exhausted { attempts }))) => {
                assert_eq!(attempts, 3);
                break;
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    assert_eq!(transport_errors, 3);
    let mut status = channel.watch_status();
    status
        .wait_for(|status| status.state == ChannelState::Exhausted)
        .await
        .unwrap();
}

#[tokio::test]
async fn stalled_upgrade_counts_as_a_failure_until_exhausted() {
    // Accepts TCP but never answers the upgrade request
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/ws/realtime", listener.local_addr().unwrap())).unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });

    let connector =
        WebSocketConnector::new(url).with_handshake_timeout(Duration::from_millis(100));
    let channel = RealtimeChannel::new(Arc::new(connector), fast_policy(5));
    let mut updates = channel.updates();
    channel.connect();

    let mut timeouts = 0;
    loop {
        match timeout(Duration::from_secs(10), updates.recv()).await {
            Ok(Some(ChannelUpdate::Error(ChannelError::Transport(reason)))) => {
                assert!(reason.contains("timed out"), "{}", reason);
                timeouts += 1;
            }
            Ok(Some(ChannelUpdate::Error(ChannelError::Exhausted { attempts }))) => {
                assert_eq!(attempts, 5);
                break;
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    assert_eq!(timeouts, 5);
    assert_eq!(accepted.load(Ordering::SeqCst), 5);
    let mut status = channel.watch_status();
    status
        .wait_for(|status| status.state == ChannelState::Exhausted)
        .await
        .unwrap();
}
