//! WebSocket change broadcaster
//!
//! Upgrade requests on any path of the HTTP port become hub clients. Every
//! [`ChangeEvent`] is serialized once and published on a broadcast channel;
//! each client task forwards the JSON text in publish order. The protocol is
//! server → client only: client text/binary frames are ignored, pings are
//! answered by tungstenite, close frames end the session.
//!
//! ```text
//! watcher ──► WsHub::broadcast ──► broadcast::Sender<String>
//!                                      ├──► client task ──► ws
//!                                      └──► client task ──► ws
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode};
use futures_util::{SinkExt, StreamExt};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::events::ServerLog;
use crate::schema::ChangeEvent;

const EVENT_CAPACITY: usize = 1024;

/// Whether a request asks for a WebSocket upgrade
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    let upgrade = headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    let connection = headers
        .get(header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);
    upgrade && connection
}

/// Hub of connected WebSocket clients
pub struct WsHub {
    events: broadcast::Sender<String>,
    clients: Mutex<HashMap<String, JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
    log: ServerLog,
}

impl WsHub {
    pub fn new(log: ServerLog) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            events,
            clients: Mutex::new(HashMap::new()),
            shutdown,
            log,
        })
    }

    /// Publish a change to every open client
    pub fn broadcast(&self, event: &ChangeEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                self.log.error(format!("Failed to serialize change event: {}", e));
                return;
            }
        };
        if self.events.send(payload).is_err() {
            tracing::trace!("No WebSocket clients for {:?}", event);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Answer an upgrade request and hand the upgraded socket to a client task.
    pub fn upgrade<B>(self: &Arc<Self>, mut req: Request<B>) -> Response<Body> {
        let key = match req.headers().get(header::SEC_WEBSOCKET_KEY) {
            Some(key) => derive_accept_key(key.as_bytes()),
            None => return plain_response(StatusCode::BAD_REQUEST, "Missing Sec-WebSocket-Key"),
        };

        // Subscribe now so events published during the handshake are kept
        let events = self.events.subscribe();
        let shutdown = self.shutdown.subscribe();

        // `close` flips the flag and drains under this lock
        let mut clients = self.clients.lock();
        if *shutdown.borrow() {
            return plain_response(StatusCode::SERVICE_UNAVAILABLE, "Server is stopping");
        }

        let on_upgrade = hyper::upgrade::on(&mut req);
        let hub = Arc::clone(self);
        let client_id = format!("ws_{}", uuid::Uuid::new_v4().simple());
        let id = client_id.clone();
        let handle = tokio::spawn(async move {
            match on_upgrade.await {
                Ok(upgraded) => {
                    let ws = WebSocketStream::from_raw_socket(
                        TokioIo::new(upgraded),
                        Role::Server,
                        None,
                    )
                    .await;
                    hub.run_client(&id, ws, events, shutdown).await;
                }
                Err(e) => hub.log.warn(format!("WebSocket upgrade failed: {}", e)),
            }
            hub.clients.lock().remove(&id);
        });
        clients.insert(client_id, handle);
        drop(clients);

        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
        let headers = response.headers_mut();
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        if let Ok(accept) = HeaderValue::from_str(&key) {
            headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept);
        }
        response
    }

    async fn run_client<S>(
        &self,
        client_id: &str,
        mut ws: WebSocketStream<S>,
        mut events: broadcast::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        self.log.info("WebSocket client connected");

        if *shutdown.borrow_and_update() {
            send_close(client_id, &mut ws).await;
            self.log.info("WebSocket client disconnected");
            return;
        }

        loop {
            tokio::select! {
                msg = ws.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        // tungstenite answers pings itself
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!("WebSocket {} error: {}", client_id, e);
                            break;
                        }
                    }
                }

                event = events.recv() => {
                    match event {
                        Ok(payload) => {
                            if let Err(e) = ws.send(Message::Text(payload)).await {
                                tracing::debug!("WebSocket {} send failed: {}", client_id, e);
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            self.log.warn(format!(
                                "WebSocket client {} fell behind, {} events dropped",
                                client_id, skipped
                            ));
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                _ = shutdown.changed() => {
                    send_close(client_id, &mut ws).await;
                    break;
                }
            }
        }

        self.log.info("WebSocket client disconnected");
    }

    /// Close every client: send a close frame, wait up to `timeout`, then abort.
    pub async fn close(&self, timeout: Duration) {
        let handles: Vec<(String, JoinHandle<()>)> = {
            let mut clients = self.clients.lock();
            self.shutdown.send_replace(true);
            clients.drain().collect()
        };
        if handles.is_empty() {
            return;
        }

        let aborts: Vec<_> = handles.iter().map(|(_, h)| h.abort_handle()).collect();
        let joined = futures_util::future::join_all(handles.into_iter().map(|(_, h)| h));
        if tokio::time::timeout(timeout, joined).await.is_err() {
            tracing::warn!("WebSocket clients did not close in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

async fn send_close<S>(client_id: &str, ws: &mut WebSocketStream<S>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Away,
        reason: "server stopping".into(),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        tracing::debug!("WebSocket {} close failed: {}", client_id, e);
    }
}

fn plain_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}
