//! Common test utilities and fixtures for genesys-devserver integration tests
//!
//! This module provides:
//! - `TestProject` builder for temporary project directories
//! - Helpers to start a `FileServer` on a free loopback port
//! - WebSocket helpers for collecting change events

#![allow(unused_imports)]
#![allow(dead_code)]


pub use test_project::TestProject;

use std::net::TcpListener;
use std::time::Duration;

use futures_util::StreamExt;
use genesys_devserver::{ChangeEvent, FileServer, Settings};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Settings with a short drain timeout so stop() is quick in tests
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.drain_timeout_ms = 200;
    settings
}

/// Ask the OS for a port that is free right now
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral port");
    listener.local_addr().unwrap().port()
}

/// Start a server for `project` on a free port
pub async fn start_server(project: &TestProject) -> FileServer {
    let server = FileServer::new(test_settings());
    server
        .start(free_port(), project.path())
        .await
        .expect("Failed to start file server");
    server
}

pub fn base_url(server: &FileServer) -> String {
    let addr = server.local_addr().expect("server is not running");
    format!("http://{}", addr)
}

pub async fn connect_ws(server: &FileServer) -> WsClient {
    let addr = server.local_addr().expect("server is not running");
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/", addr))
        .await
        .expect("WebSocket handshake failed");
    ws
}

/// Collect change events until `done` holds or `timeout` passes.
pub async fn collect_events<F>(ws: &mut WsClient, timeout: Duration, done: F) -> Vec<ChangeEvent>
where
    F: Fn(&[ChangeEvent]) -> bool,
{
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + timeout;
    while !done(&events) {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                events.push(serde_json::from_str(&text).expect("invalid change event"));
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) | Ok(None) | Err(_) => break,
        }
    }
    events
}

/// Poll `check` every 20ms until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
