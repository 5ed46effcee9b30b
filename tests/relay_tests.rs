//! Tests for the feed relay over real localhost sockets: fan-out between
//! WebSocket clients and a session subscribed through `realtime_url`.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use webinar_chat::message::SenderKind;
use webinar_chat::realtime::FeedEvent;
use webinar_chat::relay::FeedRelay;
use webinar_chat::session::{ChatSession, SessionHandle};
use webinar_chat::SessionConfig;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_relay() -> (Arc<FeedRelay>, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let relay = Arc::new(FeedRelay::default());
    tokio::spawn(Arc::clone(&relay).serve(listener));
    (relay, format!("ws://{addr}"))
}

async fn wait_for_subscribers(relay: &FeedRelay, n: usize) {
    for _ in 0..200 {
        if relay.subscriber_count() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("relay never reached {n} subscribers");
}

async fn wait_for_text(handle: &SessionHandle, text: &str) -> bool {
    for _ in 0..200 {
        if handle.snapshot().messages.iter().any(|m| m.text == text) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_client_frames_fan_out_to_other_clients() {
    let (relay, url) = start_relay().await;
    let (mut alice, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut bob, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    wait_for_subscribers(&relay, 2).await;

    let event = FeedEvent::message("Hello from Alice", SenderKind::User, Some("Alice".into()));
    alice
        .send(WsMessage::Text(serde_json::to_string(&event).unwrap()))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), bob.next())
        .await
        .expect("bob received nothing")
        .unwrap()
        .unwrap();
    let received: FeedEvent = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(received, event);
}

#[tokio::test]
async fn test_session_receives_published_messages() {
    let (relay, url) = start_relay().await;
    let config = SessionConfig {
        seed: Some(21),
        ..SessionConfig::default()
    };
    let handle = ChatSession::builder()
        .config(config)
        .realtime_url(url)
        .mount()
        .unwrap();
    wait_for_subscribers(&relay, 1).await;

    let reached = relay.publish(&FeedEvent::message(
        "Live from the studio",
        SenderKind::Host,
        Some("Producer".into()),
    ));
    assert_eq!(reached, 1);
    assert!(wait_for_text(&handle, "Live from the studio").await);

    let snapshot = handle.snapshot();
    let message = snapshot
        .messages
        .iter()
        .find(|m| m.text == "Live from the studio")
        .unwrap();
    assert_eq!(message.sender_kind, SenderKind::Host);
    assert_eq!(message.sender_name, "Producer");

    let summary = handle.unmount().await.unwrap();
    assert!(summary.realtime_closed);
    for _ in 0..200 {
        if relay.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(relay.subscriber_count(), 0);
}

#[tokio::test]
async fn test_unreachable_feed_does_not_stop_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let handle = ChatSession::builder()
        .config(SessionConfig {
            seed: Some(22),
            ..SessionConfig::default()
        })
        .realtime_url(format!("ws://{addr}"))
        .mount()
        .unwrap();

    handle.submit("is anyone there?").unwrap();
    assert!(wait_for_text(&handle, "is anyone there?").await);
    assert!(handle.snapshot().mounted);
    handle.unmount().await.unwrap();
}
