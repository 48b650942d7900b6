//! File server lifecycle
//!
//! [`FileServer`] owns one listener, one [`WsHub`] and one watcher at a time.
//! HTTP and WebSocket traffic share the port: every accepted socket is served
//! by hyper in its own tracked task, and upgrade requests are handed to the
//! hub before they reach the API router.
//!
//! ```text
//! TcpListener ──accept──► ConnectionTracker::spawn ──► hyper http1
//!                                                        ├── upgrade ──► WsHub
//!                                                        └── request ──► api::router
//! notify ──► watcher ──► WsHub::broadcast
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tower::ServiceExt;

use crate::builder::{BundlerProjectBuilder, ProjectBuilder};
use crate::config::{ServerConfig, Settings};
use crate::events::ServerLog;
use crate::schema::{ServerPhase, ServerStatus};
use crate::{FileServerError, Result};

use super::api::{self, ApiState};
use super::hub::{self, WsHub};
use super::tracker::ConnectionTracker;
use super::watcher::{self, WatcherHandle};

/// Resources of one running instance
struct RunningServer {
    hub: Arc<WsHub>,
    watcher: Option<WatcherHandle>,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

/// State readable without waiting on the start/stop mutex
struct Snapshot {
    status: ServerStatus,
    local_addr: Option<SocketAddr>,
    hub: Option<Arc<WsHub>>,
}

/// Local development file server
pub struct FileServer {
    settings: Settings,
    builder: Arc<dyn ProjectBuilder>,
    log: ServerLog,
    tracker: Arc<ConnectionTracker>,
    snapshot: RwLock<Snapshot>,
    running: Mutex<Option<RunningServer>>,
}

impl FileServer {
    pub fn new(settings: Settings) -> Self {
        let builder = Arc::new(BundlerProjectBuilder::new(&settings.build));
        Self::with_builder(settings, builder)
    }

    /// Create a server that runs `builder` for `POST /api/build-project`.
    pub fn with_builder(settings: Settings, builder: Arc<dyn ProjectBuilder>) -> Self {
        let log = ServerLog::new(settings.logging.history);
        Self {
            snapshot: RwLock::new(Snapshot {
                status: ServerStatus {
                    is_running: false,
                    port: settings.server.port,
                    root_directory: None,
                    phase: ServerPhase::Stopped,
                },
                local_addr: None,
                hub: None,
            }),
            settings,
            builder,
            log,
            tracker: Arc::new(ConnectionTracker::new()),
            running: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start serving `root` on `port`. A running instance is stopped first.
    pub async fn start(&self, port: u16, root: impl AsRef<Path>) -> Result<()> {
        let config = ServerConfig::new(port, root)?;
        let mut running = self.running.lock().await;

        if let Some(previous) = running.take() {
            self.shutdown(previous).await;
        }

        self.set_phase(ServerPhase::Starting);
        let addr = SocketAddr::new(self.settings.server.host, config.port());
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.set_phase(ServerPhase::Stopped);
                let err = FileServerError::PortBind { addr, source };
                self.log.error(format!("Failed to start file server: {}", err));
                return Err(err);
            }
        };
        let local_addr = listener.local_addr().unwrap_or(addr);
        let root = config.root_directory().to_path_buf();

        let hub = WsHub::new(self.log.clone());
        let state = ApiState::new(
            root.clone(),
            &self.settings,
            Arc::clone(&self.builder),
            self.log.clone(),
        );
        let router = api::router(state, &self.settings);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            router,
            Arc::clone(&hub),
            Arc::clone(&self.tracker),
            shutdown_rx,
        ));

        let watcher = match watcher::watch(&root, Arc::clone(&hub), self.log.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.log.error(format!("{}; live updates disabled", e));
                None
            }
        };

        {
            let mut snapshot = self.snapshot.write();
            snapshot.status = ServerStatus {
                is_running: true,
                port: local_addr.port(),
                root_directory: Some(root.clone()),
                phase: ServerPhase::Running,
            };
            snapshot.local_addr = Some(local_addr);
            snapshot.hub = Some(Arc::clone(&hub));
        }

        *running = Some(RunningServer {
            hub,
            watcher,
            shutdown,
            accept_task,
        });
        self.log.info(format!(
            "File server started on port {} at {}",
            local_addr.port(),
            root.display()
        ));
        Ok(())
    }

    /// Stop the running instance. Does nothing when already stopped.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if let Some(server) = running.take() {
            self.shutdown(server).await;
        }
    }

    async fn shutdown(&self, mut server: RunningServer) {
        self.set_phase(ServerPhase::Stopping);
        self.log.info("Stopping file server...");
        let drain = self.settings.server.drain_timeout();

        if let Some(mut watcher) = server.watcher.take() {
            watcher.stop();
        }

        server.hub.close(drain).await;
        self.log.info("WebSocket server stopped");

        // Stops accepting and tells every connection to finish up
        server.shutdown.send_replace(true);
        if let Err(e) = server.accept_task.await {
            self.log.error(format!("Accept loop failed: {}", e));
        }

        if !self.tracker.wait_idle(drain).await {
            tracing::debug!("Connections still open after {:?}", drain);
        }
        self.log.info(format!(
            "Destroying {} connections.",
            self.tracker.len()
        ));
        self.tracker.terminate_all();

        {
            let mut snapshot = self.snapshot.write();
            snapshot.status.is_running = false;
            snapshot.status.root_directory = None;
            snapshot.status.phase = ServerPhase::Stopped;
            snapshot.local_addr = None;
            snapshot.hub = None;
        }
        self.log.info("File server stopped");
    }

    fn set_phase(&self, phase: ServerPhase) {
        let mut snapshot = self.snapshot.write();
        snapshot.status.phase = phase;
        snapshot.status.is_running = phase == ServerPhase::Running;
    }

    pub fn status(&self) -> ServerStatus {
        self.snapshot.read().status.clone()
    }

    pub fn is_running(&self) -> bool {
        self.snapshot.read().status.is_running
    }

    /// Address the listener is bound to while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.snapshot.read().local_addr
    }

    pub fn root_directory(&self) -> Option<PathBuf> {
        self.snapshot.read().status.root_directory.clone()
    }

    /// Open HTTP connections. Upgraded WebSocket sockets belong to the hub.
    pub fn connection_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn client_count(&self) -> usize {
        self.snapshot
            .read()
            .hub
            .as_ref()
            .map(|hub| hub.client_count())
            .unwrap_or(0)
    }

    pub fn logs(&self) -> &ServerLog {
        &self.log
    }
}

impl std::fmt::Debug for FileServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileServer")
            .field("status", &self.status())
            .field("tracker", &self.tracker)
            .finish()
    }
}

async fn accept_loop(
    listener: TcpListener,
    router: Router,
    hub: Arc<WsHub>,
    tracker: Arc<ConnectionTracker>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        tracing::trace!("Accepted connection from {}", peer);
                        let conn = serve_connection(
                            stream,
                            router.clone(),
                            Arc::clone(&hub),
                            shutdown.clone(),
                        );
                        tracker.spawn(peer, conn);
                    }
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        // Back off on fd exhaustion and similar
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Listener closed");
}

async fn serve_connection(
    stream: TcpStream,
    router: Router,
    hub: Arc<WsHub>,
    mut shutdown: watch::Receiver<bool>,
) {
    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
        let router = router.clone();
        let hub = Arc::clone(&hub);
        async move {
            if hub::is_websocket_upgrade(req.headers()) {
                return Ok::<_, Infallible>(hub.upgrade(req));
            }
            router.oneshot(req.map(Body::new)).await
        }
    });

    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    tokio::pin!(conn);

    if *shutdown.borrow_and_update() {
        conn.as_mut().graceful_shutdown();
    }
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!("Connection error: {}", e);
                }
                break;
            }
            changed = shutdown.changed() => {
                conn.as_mut().graceful_shutdown();
                if changed.is_err() {
                    // Sender gone; finish the connection without further signals
                    if let Err(e) = conn.as_mut().await {
                        tracing::debug!("Connection error: {}", e);
                    }
                    break;
                }
            }
        }
    }
}
