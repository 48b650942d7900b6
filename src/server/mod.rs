//! Local development file server
//!
//! Serves a project directory over HTTP and pushes filesystem changes to
//! WebSocket clients on the same port.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          FileServer                               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────┐     │
//! │  │ TcpListener  │─>│  Connection  │─>│ hyper http1          │     │
//! │  │ (accept loop)│  │   Tracker    │  │  ├─ api::router      │     │
//! │  └──────────────┘  └──────────────┘  │  └─ WsHub (upgrade)  │     │
//! │                                      └──────────────────────┘     │
//! │  ┌──────────────┐       ┌──────────────┐                          │
//! │  │ FileWatcher  │──────>│    WsHub     │──> WebSocket clients     │
//! │  └──────────────┘       └──────────────┘                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Locking
//!
//! `parking_lot` locks (tracker registry, hub clients, status snapshot) are
//! never held across an `.await`. Start and stop are serialized by the
//! lifecycle's async mutex.
//!
//! # Modules
//!
//! - `api` - HTTP routes and static file fallback
//! - `hub` - WebSocket change broadcaster
//! - `lifecycle` - Start/stop state machine
//! - `tracker` - Open connection registry
//! - `watcher` - File system watching

pub mod api;
pub mod hub;
pub mod lifecycle;
pub mod tracker;
pub mod watcher;

pub use api::{router, ApiState};
pub use hub::WsHub;
pub use lifecycle::FileServer;
pub use tracker::ConnectionTracker;
pub use watcher::{ChangeClassifier, WatcherHandle};
