//! # weft-session - Connection Management
//!
//! Transport layer of the Weft client runtime: the live websocket
//! connection with health-checked URI selection and bounded reconnection,
//! the static replay connection for published snapshots, the forward-message
//! dedup cache, and the connection manager that presents one event surface
//! to the app shell.
//!
//! ## Public API
//!
//! ### Connections
//! - [`ConnectionManager`] - Owns the session's single logical connection
//! - [`WebsocketConnection`] - Live duplex channel with retry/backoff
//! - [`static_conn`] - Snapshot fetch-and-replay path
//! - [`SessionEvent`] - Ordered event surface (states, messages, errors)
//!
//! ### Side channel
//! - [`Endpoints`] / [`HttpEndpoints`] - Non-websocket HTTP endpoints
//! - [`ForwardMsgCache`] - Content-hash message dedup with run-count aging
//! - [`upload`] - File uploads with cancellation
//! - [`Storage`] / [`FileStorage`] / [`MemoryStorage`] - Best-effort local
//!   persistence

pub mod cache;
pub mod endpoints;
pub mod events;
pub mod manager;
pub mod static_conn;
pub mod storage;
pub mod upload;
pub mod uri;
pub mod websocket;

pub use cache::ForwardMsgCache;
pub use endpoints::{Endpoints, HttpEndpoints, LocalEndpoints};
pub use events::SessionEvent;
pub use manager::{
    parse_session_url, ConnectionManager, ConnectionManagerConfig, RETRY_COUNT_FOR_WARNING,
};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use upload::{upload_file, validate_file, CancelHandle, UploadOutcome};
pub use websocket::{
    WebsocketConnection, WebsocketConnectionConfig, MAX_RETRIES_BEFORE_DISCONNECT,
};
