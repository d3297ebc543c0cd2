//! End-to-end tests against an in-process mock backend
//!
//! Each test binds a real WebSocket server on a loopback port and
//! scripts the frames it sends, so the full client path is exercised:
//! connect, liveness probe, correlated selection, progress updates,
//! reconnection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use arcana_core::{
    ArcanaClient, ClientConfig, ConnectionState, RepoData, RequestError, SyncStatus,
};

fn fast_config(url: &str) -> ClientConfig {
    ClientConfig {
        url: url.to_string(),
        request_timeout: Duration::from_millis(500),
        reconnect_delay: Duration::from_millis(50),
        send_retry_delay: Duration::from_millis(50),
        max_reconnect_attempts: 5,
    }
}

fn repo(name: &str) -> RepoData {
    RepoData {
        repo_id: 1,
        name: name.to_string(),
        owner: "o".to_string(),
        url: "https://github.com/o/x".to_string(),
        branch: None,
    }
}

/// Read the next text frame, skipping control frames
async fn read_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(Message::Text(text)) => return Some(text),
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

fn response_frame(message_id: &str, body: &str) -> String {
    format!(
        r#"{{"type":"workspace_select_github_response","messageId":"{}",{}}}"#,
        message_id, body
    )
}

async fn wait_connected(client: &ArcanaClient) {
    let mut state_rx = client.subscribe_state();
    timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .expect("client did not connect in time")
    .unwrap();
}

#[tokio::test]
async fn client_connects_and_sends_liveness_probe() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let text = read_text(&mut ws).await.unwrap();
        let frame: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["type"], "ping");
        assert!(frame["clientId"].as_str().unwrap().starts_with("arcana-"));
        assert!(frame["clientTimestamp"].is_i64());
        // hold the socket so the client-side state assertions can run
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let client = ArcanaClient::connect(fast_config(&format!("ws://{}", addr)));
    wait_connected(&client).await;
    // the probe assertions run on the server side
    server.await.unwrap();
    client.shutdown();
}

#[tokio::test]
async fn select_github_repo_resolves_through_progress_sequence() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ping = read_text(&mut ws).await.unwrap();

        let select = read_text(&mut ws).await.unwrap();
        let frame: Value = serde_json::from_str(&select).unwrap();
        assert_eq!(frame["type"], "workspace_select_github");
        assert_eq!(frame["repoData"]["name"], "x");
        assert_eq!(frame["accessToken"], "tok");
        let id = frame["messageId"].as_str().unwrap().to_string();

        for body in [
            r#""status":"cloning","progress":5,"message":"Cloning repository""#,
            r#""status":"cloning","progress":50"#,
            r#""status":"success","workspaceId":"ws-1""#,
        ] {
            ws.send(Message::Text(response_frame(&id, body)))
                .await
                .unwrap();
        }
        // keep the socket open until the client has read everything
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let client = ArcanaClient::connect(fast_config(&format!("ws://{}", addr)));
    wait_connected(&client).await;

    // record the dispatched response frames behind the built-in handling
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_by_listener = std::sync::Arc::clone(&seen);
    let _sub = client.add_message_listener("workspace_select_github_response", move |v| {
        seen_by_listener
            .lock()
            .unwrap()
            .push(v["status"].as_str().unwrap_or_default().to_string());
    });

    let result = client.select_github_repo(repo("x"), "tok").await.unwrap();
    assert_eq!(result.workspace_id, "ws-1");

    let mut sync_rx = client.subscribe_sync();
    timeout(
        Duration::from_secs(1),
        sync_rx.wait_for(|s| s.status == SyncStatus::Synchronized),
    )
    .await
    .expect("session did not reach synchronized")
    .unwrap();
    let snap = client.sync_state();
    assert_eq!(snap.progress, 100);
    assert!(snap.error.is_none());

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["cloning".to_string(), "cloning".to_string(), "success".to_string()]
    );

    server.await.unwrap();
    client.shutdown();
}

#[tokio::test]
async fn select_github_repo_rejects_on_server_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ping = read_text(&mut ws).await.unwrap();

        let select = read_text(&mut ws).await.unwrap();
        let frame: Value = serde_json::from_str(&select).unwrap();
        let id = frame["messageId"].as_str().unwrap().to_string();

        ws.send(Message::Text(response_frame(
            &id,
            r#""status":"error","message":"boom""#,
        )))
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let client = ArcanaClient::connect(fast_config(&format!("ws://{}", addr)));
    wait_connected(&client).await;

    let result = client.select_github_repo(repo("x"), "tok").await;
    assert_eq!(result, Err(RequestError::Server("boom".to_string())));

    let mut sync_rx = client.subscribe_sync();
    timeout(
        Duration::from_secs(1),
        sync_rx.wait_for(|s| s.status == SyncStatus::Error),
    )
    .await
    .expect("session did not reach error")
    .unwrap();
    assert_eq!(client.sync_state().error.as_deref(), Some("boom"));

    server.await.unwrap();
    client.shutdown();
}

#[tokio::test]
async fn select_github_repo_times_out_and_ignores_late_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ping = read_text(&mut ws).await.unwrap();

        let select = read_text(&mut ws).await.unwrap();
        let frame: Value = serde_json::from_str(&select).unwrap();
        let id = frame["messageId"].as_str().unwrap().to_string();

        // answer well after the client's request timeout
        tokio::time::sleep(Duration::from_millis(600)).await;
        ws.send(Message::Text(response_frame(
            &id,
            r#""status":"success","workspaceId":"ws-late""#,
        )))
        .await
        .ok();
        // a dropped socket would reset the session to idle; hold it
        // open until the client has asserted on the late response
        close_rx.await.ok();
        drop(ws);
    });

    let mut config = fast_config(&format!("ws://{}", addr));
    config.request_timeout = Duration::from_millis(200);
    let client = ArcanaClient::connect(config);
    wait_connected(&client).await;

    let result = client.select_github_repo(repo("x"), "tok").await;
    assert_eq!(result, Err(RequestError::Timeout));
    assert_eq!(client.sync_state().status, SyncStatus::Error);

    // the late success must not flip the session after rejection
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(client.sync_state().status, SyncStatus::Error);

    close_tx.send(()).ok();
    server.await.unwrap();
    client.shutdown();
}

#[tokio::test]
async fn timeout_racing_a_success_response_never_contradicts_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // answer every selection immediately, so with a tight client
    // timeout either side can win the race
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(text) = read_text(&mut ws).await {
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == "workspace_select_github" {
                let id = frame["messageId"].as_str().unwrap();
                // a send can fail when the client shuts down with a
                // response still in flight; that is an expected outcome
                // of the race this test creates, not a fault
                if ws
                    .send(Message::Text(response_frame(
                        id,
                        r#""status":"success","workspaceId":"ws-1""#,
                    )))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    });

    let mut config = fast_config(&format!("ws://{}", addr));
    config.request_timeout = Duration::from_millis(2);
    let client = ArcanaClient::connect(config);
    wait_connected(&client).await;

    for _ in 0..10 {
        let result = client.select_github_repo(repo("x"), "tok").await;
        let snap = client.sync_state();
        match result {
            Ok(selection) => assert_eq!(selection.workspace_id, "ws-1"),
            // a timed-out request must not leave a synchronized session
            // behind; when the response settled first, that outcome is
            // the one reported
            Err(RequestError::Timeout) => assert_ne!(snap.status, SyncStatus::Synchronized),
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }

    client.shutdown();
    server.await.unwrap();
}

#[tokio::test]
async fn disconnect_resets_session_and_rejects_in_flight_request() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ping = read_text(&mut ws).await.unwrap();

        let select = read_text(&mut ws).await.unwrap();
        let frame: Value = serde_json::from_str(&select).unwrap();
        let id = frame["messageId"].as_str().unwrap().to_string();

        ws.send(Message::Text(response_frame(
            &id,
            r#""status":"cloning","progress":50"#,
        )))
        .await
        .unwrap();

        // drop the connection mid-sync once the client has seen progress
        close_rx.await.ok();
        drop(ws);
    });

    let client = ArcanaClient::connect(fast_config(&format!("ws://{}", addr)));
    wait_connected(&client).await;

    let mut sync_rx = client.subscribe_sync();
    let driver = async move {
        timeout(
            Duration::from_secs(2),
            sync_rx.wait_for(|s| s.status == SyncStatus::Syncing && s.progress == 50),
        )
        .await
        .expect("session never reached syncing")
        .unwrap();
        close_tx.send(()).ok();
    };

    let (result, ()) = tokio::join!(client.select_github_repo(repo("x"), "tok"), driver);
    assert_eq!(result, Err(RequestError::ConnectionClosed));

    let mut sync_rx = client.subscribe_sync();
    timeout(
        Duration::from_secs(2),
        sync_rx.wait_for(|s| s.status == SyncStatus::Idle && s.progress == 0),
    )
    .await
    .expect("session was not reset to idle")
    .unwrap();

    server.await.unwrap();
    client.shutdown();
}

#[tokio::test]
async fn reconnect_stops_at_ceiling_until_manual_reconnect() {
    // reserve a loopback port with nothing listening on it
    let placeholder = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = placeholder.local_addr().unwrap();
    drop(placeholder);

    let mut config = fast_config(&format!("ws://{}", addr));
    config.reconnect_delay = Duration::from_millis(30);
    let client = ArcanaClient::connect(config);

    // initial attempt plus five scheduled retries, all refused
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    // a server appears, but the ceiling is reached: no automatic attempt
    let listener = TcpListener::bind(addr).await.unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let _ping = read_text(&mut ws).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    // a manual reconnect resets the counter and connects right away
    client.reconnect();
    wait_connected(&client).await;

    server.abort();
    client.shutdown();
}

#[tokio::test]
async fn send_message_reports_transport_availability() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (frame_tx, mut frame_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(text) = read_text(&mut ws).await {
            frame_tx.send(text).ok();
        }
    });

    let client = ArcanaClient::connect(fast_config(&format!("ws://{}", addr)));
    wait_connected(&client).await;

    assert!(client.send_message(r#"{"type":"chat","text":"hello"}"#));

    // the server sees the probe first, then our frame
    let first = timeout(Duration::from_secs(2), frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first.contains("ping"));
    let second = timeout(Duration::from_secs(2), frame_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(second.contains("hello"));

    client.shutdown();
    server.abort();

    // a fresh client pointed at a dead endpoint cannot send
    let placeholder = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = placeholder.local_addr().unwrap();
    drop(placeholder);
    let offline = ArcanaClient::connect(fast_config(&format!("ws://{}", dead_addr)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!offline.send_message(r#"{"type":"chat","text":"lost"}"#));
    offline.shutdown();
}
