//! Start/stop state machine, port ownership and connection teardown

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

use crate::common::{connect_ws, eventually, free_port, start_server, test_settings, TestProject};
use genesys_devserver::{FileServer, FileServerError, ServerPhase};

fn port_is_free(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[tokio::test]
async fn test_start_reports_status() {
    let project = TestProject::new();
    let server = FileServer::new(test_settings());
    let port = free_port();

    server.start(port, project.path()).await.unwrap();
    let status = server.status();
    assert!(status.is_running);
    assert_eq!(status.phase, ServerPhase::Running);
    assert_eq!(status.port, port);
    assert_eq!(status.root_directory.as_deref(), Some(project.path()));
    assert_eq!(server.local_addr().map(|a| a.port()), Some(port));

    server.stop().await;
    let status = server.status();
    assert!(!status.is_running);
    assert_eq!(status.phase, ServerPhase::Stopped);
    assert!(status.root_directory.is_none());
    assert!(port_is_free(port));
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let project = TestProject::new();
    let server = start_server(&project).await;

    server.stop().await;
    server.stop().await;
    assert_eq!(server.status().phase, ServerPhase::Stopped);
    assert_eq!(server.connection_count(), 0);
}

#[tokio::test]
async fn test_restart_releases_previous_port() {
    let first = TestProject::new();
    let second = TestProject::new();
    let server = FileServer::new(test_settings());
    let old_port = free_port();
    let new_port = free_port();

    server.start(old_port, first.path()).await.unwrap();
    server.start(new_port, second.path()).await.unwrap();

    assert!(port_is_free(old_port));
    let status = server.status();
    assert_eq!(status.port, new_port);
    assert_eq!(status.root_directory.as_deref(), Some(second.path()));

    server.stop().await;
}

#[tokio::test]
async fn test_restart_on_same_port() {
    let project = TestProject::new();
    let server = FileServer::new(test_settings());
    let port = free_port();

    server.start(port, project.path()).await.unwrap();
    server.start(port, project.path()).await.unwrap();
    assert!(server.is_running());

    let response = reqwest::get(format!("http://127.0.0.1:{}/api/files", port))
        .await
        .unwrap();
    assert!(response.status().is_success());

    server.stop().await;
}

#[tokio::test]
async fn test_bind_failure_leaves_server_stopped() {
    let project = TestProject::new();
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let server = FileServer::new(test_settings());
    let err = server.start(port, project.path()).await.unwrap_err();
    match &err {
        FileServerError::PortBind { addr, .. } => assert_eq!(addr.port(), port),
        other => panic!("expected bind error, got {other:?}"),
    }
    let status = server.status();
    assert!(!status.is_running);
    assert_eq!(status.phase, ServerPhase::Stopped);
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn test_independent_instances() {
    let a = TestProject::new();
    let b = TestProject::new();
    a.add_file("a.txt", "a");
    b.add_file("b.txt", "b");

    let first = start_server(&a).await;
    let second = start_server(&b).await;
    assert_ne!(first.local_addr(), second.local_addr());

    let body = reqwest::get(format!("http://{}/b.txt", second.local_addr().unwrap()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "b");

    first.stop().await;
    assert!(second.is_running());
    second.stop().await;
}

#[tokio::test]
async fn test_stop_closes_keep_alive_connections() {
    const CLIENTS: usize = 4;
    let project = TestProject::new();
    project.add_file("index.html", "<html></html>");
    let server = start_server(&project).await;
    let addr = server.local_addr().unwrap();

    let mut streams = Vec::new();
    for _ in 0..CLIENTS {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n",
            )
            .await
            .unwrap();
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));
        streams.push(stream);
    }
    assert!(eventually(Duration::from_secs(2), || server.connection_count() == CLIENTS).await);

    server.stop().await;
    assert_eq!(server.connection_count(), 0);

    for mut stream in streams {
        let mut buf = [0u8; 64];
        let read = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
            .await
            .expect("connection left open after stop");
        // EOF or reset, either way the socket is gone
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}

#[tokio::test]
async fn test_stop_closes_websocket_clients() {
    let project = TestProject::new();
    let server = start_server(&project).await;
    let mut ws = connect_ws(&server).await;
    assert!(eventually(Duration::from_secs(2), || server.client_count() == 1).await);

    server.stop().await;
    assert_eq!(server.client_count(), 0);

    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("client not closed");
    assert!(matches!(next, Some(Ok(Message::Close(_))) | Some(Err(_)) | None));
}

#[tokio::test]
async fn test_start_after_stop() {
    let project = TestProject::new();
    let server = start_server(&project).await;
    server.stop().await;

    let port = free_port();
    server.start(port, project.path()).await.unwrap();
    assert_eq!(server.status().port, port);
    server.stop().await;
}
