//! Connection manager: one logical connection per session.
//!
//! Decides live-vs-static from the session URL, owns exactly one connection
//! implementation at a time, and presents a single event surface to the app
//! shell: deduplicated state changes, decoded messages, and error notices.

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use weft_core::prelude::*;
use weft_core::state::ConnectionState;
use weft_core::wire::BackMsg;

use crate::endpoints::Endpoints;
use crate::events::SessionEvent;
use crate::static_conn::{self, STATIC_ASSET_CONFIG_URL};
use crate::storage::Storage;
use crate::uri;
use crate::websocket::{WebsocketConnection, WebsocketConnectionConfig};

/// When the live connection reports this many retries, surface a "having
/// trouble connecting" notice. By the 6th attempt the backoff waits sum to
/// roughly 15.5 s (0.5 + 1 + 2 + 4 + 8, jitter aside) — long enough that
/// the user deserves an explanation, without changing connection state.
pub const RETRY_COUNT_FOR_WARNING: u32 = 6;

/// Capacity of the internal event channel between connection and manager.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for a session's connection.
#[derive(Debug, Clone)]
pub struct ConnectionManagerConfig {
    /// The session URL: server location, base path, and query parameters
    /// (`staticAppId` selects static replay).
    pub session_url: Url,

    /// Location of the static asset configuration file.
    pub static_config_url: String,

    /// Host-supplied auth token for the websocket handshake, if any.
    pub auth_token: Option<String>,
}

impl ConnectionManagerConfig {
    pub fn new(session_url: Url) -> Self {
        Self {
            session_url,
            static_config_url: STATIC_ASSET_CONFIG_URL.to_string(),
            auth_token: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

enum ConnectionKind {
    Websocket(WebsocketConnection),
    Static,
    /// URI resolution failed at startup; terminal from birth.
    Failed,
}

/// Owns the session's single logical connection.
pub struct ConnectionManager {
    conn: ConnectionKind,
    state: Arc<std::sync::RwLock<ConnectionState>>,
}

impl ConnectionManager {
    /// Start the connection decided by the session URL. Events arrive on
    /// `shell_tx` in order, with consecutive duplicate states collapsed.
    pub fn start<E>(
        config: ConnectionManagerConfig,
        endpoints: Arc<E>,
        storage: Arc<dyn Storage>,
        shell_tx: mpsc::Sender<SessionEvent>,
    ) -> Self
    where
        E: Endpoints + Send + Sync + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(std::sync::RwLock::new(ConnectionState::Initial));

        tokio::spawn(forward_events(event_rx, shell_tx, Arc::clone(&state)));

        let conn = if let Some(static_app_id) = uri::static_app_id(&config.session_url) {
            debug!("session URL selects static replay of app '{static_app_id}'");
            let static_config_url = config.static_config_url.clone();
            let endpoints = Arc::clone(&endpoints);
            tokio::spawn(async move {
                let client = reqwest::Client::new();
                static_conn::establish_static_connection(
                    &static_app_id,
                    storage.as_ref(),
                    endpoints.as_ref(),
                    &client,
                    &static_config_url,
                    &event_tx,
                )
                .await;
            });
            ConnectionKind::Static
        } else {
            match uri::possible_base_uris(&config.session_url) {
                Ok(base_uri_list) => {
                    ConnectionKind::Websocket(WebsocketConnection::start(
                        WebsocketConnectionConfig {
                            base_uri_list,
                            auth_token: config.auth_token,
                        },
                        endpoints,
                        event_tx,
                    ))
                }
                Err(err) => {
                    // URI resolution is not retryable here; the live
                    // connection's backoff only covers chosen URIs.
                    error!("cannot derive base URIs: {err}");
                    tokio::spawn(async move {
                        let _ = event_tx
                            .send(SessionEvent::state_changed_with_error(
                                ConnectionState::DisconnectedForever,
                                err.to_string(),
                            ))
                            .await;
                    });
                    ConnectionKind::Failed
                }
            }
        };

        Self { conn, state }
    }

    /// Whether messages can currently flow.
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// The last reported connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Send a message to the backend. A logged no-op when disconnected or
    /// in static mode — the UI must not crash on a transient disconnect.
    pub fn send_back_msg(&self, msg: BackMsg) {
        match &self.conn {
            ConnectionKind::Websocket(ws) if self.is_connected() => ws.send_back_msg(msg),
            _ => error!("cannot send message when server is disconnected: {msg:?}"),
        }
    }

    /// Advance the live connection's message cache run counter. Static
    /// connections have no cache.
    pub fn increment_message_cache_run_count(&self, max_age: u32) {
        if let ConnectionKind::Websocket(ws) = &self.conn {
            ws.increment_message_cache_run_count(max_age);
        }
    }

    /// The base URI of the connected server, for live sessions.
    pub fn base_uri(&self) -> Option<Url> {
        match &self.conn {
            ConnectionKind::Websocket(ws) => ws.base_uri(),
            _ => None,
        }
    }

    /// Tear down the connection. Stops retries; no callback fires after
    /// this returns and the queues drain.
    pub fn disconnect(&self) {
        if let ConnectionKind::Websocket(ws) = &self.conn {
            ws.disconnect();
        }
    }
}

/// Forward connection events to the shell: collapse duplicate states,
/// surface failure messages, and raise the one-time retry warning.
async fn forward_events(
    mut event_rx: mpsc::Receiver<SessionEvent>,
    shell_tx: mpsc::Sender<SessionEvent>,
    state: Arc<std::sync::RwLock<ConnectionState>>,
) {
    let mut last_state: Option<ConnectionState> = None;

    while let Some(event) = event_rx.recv().await {
        match event {
            SessionEvent::StateChanged {
                state: new_state,
                message,
            } => {
                {
                    let mut guard = state.write().unwrap_or_else(|e| e.into_inner());
                    *guard = new_state;
                }

                let changed = last_state != Some(new_state);
                last_state = Some(new_state);

                if changed
                    && shell_tx
                        .send(SessionEvent::state_changed(new_state))
                        .await
                        .is_err()
                {
                    return;
                }
                if let Some(message) = message {
                    if shell_tx.send(SessionEvent::error(message)).await.is_err() {
                        return;
                    }
                }
            }

            SessionEvent::Retry {
                total_tries,
                message,
                ..
            } => {
                // Attempts 1–5 stay a passive "reconnecting" signal; the
                // 6th becomes an explicit notice, exactly once per streak.
                if total_tries == RETRY_COUNT_FOR_WARNING
                    && shell_tx.send(SessionEvent::error(message)).await.is_err()
                {
                    return;
                }
            }

            other => {
                if shell_tx.send(other).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Convenience: derive the session URL for a server address string.
pub fn parse_session_url(address: &str) -> Result<Url> {
    Url::parse(address)
        .map_err(|e| weft_core::error::Error::invalid_uri(format!("bad session URL '{address}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn run_forward(events: Vec<SessionEvent>) -> Vec<SessionEvent> {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (shell_tx, mut shell_rx) = mpsc::channel(64);
        let state = Arc::new(std::sync::RwLock::new(ConnectionState::Initial));

        let forwarder = tokio::spawn(forward_events(event_rx, shell_tx, state));
        for event in events {
            event_tx.send(event).await.unwrap();
        }
        drop(event_tx);
        forwarder.await.unwrap();

        let mut seen = Vec::new();
        while let Some(event) = shell_rx.recv().await {
            seen.push(event);
        }
        seen
    }

    fn retry(total_tries: u32) -> SessionEvent {
        SessionEvent::Retry {
            total_tries,
            message: format!("attempt {total_tries} failed"),
            next_delay: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_duplicate_states_reported_once() {
        let seen = run_forward(vec![
            SessionEvent::state_changed(ConnectionState::PingingServer),
            SessionEvent::state_changed(ConnectionState::PingingServer),
            SessionEvent::state_changed(ConnectionState::Connecting),
            SessionEvent::state_changed(ConnectionState::Connecting),
            SessionEvent::state_changed(ConnectionState::Connected),
        ])
        .await;

        let states: Vec<ConnectionState> = seen
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::PingingServer,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn test_retry_warning_fires_exactly_on_threshold() {
        let seen = run_forward((1..=8).map(retry).collect()).await;

        let errors: Vec<&str> = seen
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Error { message } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            errors,
            vec!["attempt 6 failed"],
            "only the 6th retry surfaces a notice"
        );
    }

    #[tokio::test]
    async fn test_state_failure_message_becomes_error_event() {
        let seen = run_forward(vec![SessionEvent::state_changed_with_error(
            ConnectionState::DisconnectedForever,
            "the server rejected us",
        )])
        .await;

        assert_eq!(seen.len(), 2);
        assert!(matches!(
            seen[0],
            SessionEvent::StateChanged {
                state: ConnectionState::DisconnectedForever,
                ..
            }
        ));
        assert!(matches!(
            &seen[1],
            SessionEvent::Error { message } if message == "the server rejected us"
        ));
    }

    #[tokio::test]
    async fn test_messages_forwarded_in_order() {
        use weft_core::wire::{ForwardMsg, ForwardMsgMetadata, ForwardMsgPayload};

        let msg = |n: usize| {
            SessionEvent::Message(Box::new(ForwardMsg {
                hash: Some(format!("h{n}")),
                metadata: ForwardMsgMetadata::default(),
                payload: ForwardMsgPayload::SessionStatusChanged(Default::default()),
            }))
        };

        let seen = run_forward(vec![msg(1), msg(2), msg(3)]).await;
        let hashes: Vec<&str> = seen
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Message(m) => m.hash.as_deref(),
                _ => None,
            })
            .collect();
        assert_eq!(hashes, vec!["h1", "h2", "h3"]);
    }

    #[tokio::test]
    async fn test_forwarder_tracks_last_state() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (shell_tx, mut shell_rx) = mpsc::channel(8);
        let state = Arc::new(std::sync::RwLock::new(ConnectionState::Initial));

        let handle = tokio::spawn(forward_events(event_rx, shell_tx, Arc::clone(&state)));
        event_tx
            .send(SessionEvent::state_changed(ConnectionState::Connected))
            .await
            .unwrap();
        shell_rx.recv().await.unwrap();

        assert_eq!(
            *state.read().unwrap(),
            ConnectionState::Connected,
            "manager state mirror must follow events"
        );
        drop(event_tx);
        handle.await.unwrap();
    }

    #[test]
    fn test_parse_session_url() {
        assert!(parse_session_url("http://localhost:8701/").is_ok());
        assert!(parse_session_url("not a url").is_err());
    }
}
