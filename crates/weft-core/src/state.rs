//! Connection and script-run state types

use serde::{Deserialize, Serialize};

/// Phase of the session's connection to the weft backend.
///
/// A session is either *live* (websocket) or *static* (replay of a recorded
/// snapshot); the two families of states are mutually exclusive for the
/// lifetime of a session. Transitions are monotonic within one connection
/// generation: once [`ConnectionState::DisconnectedForever`] is reached, no
/// further transitions occur without constructing a new connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No connection attempt has started yet.
    Initial,

    /// Probing candidate base URIs with a health check.
    PingingServer,

    /// Health check passed; websocket handshake in progress.
    Connecting,

    /// Live duplex channel established.
    Connected,

    /// Static snapshot fetch in progress.
    StaticConnecting,

    /// Static snapshot fully dispatched; session is read-only.
    StaticConnected,

    /// Terminal failure. Requires a new session to recover.
    DisconnectedForever,
}

impl ConnectionState {
    /// True when messages can flow (in either direction for live sessions,
    /// replay-complete for static ones).
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::StaticConnected
        )
    }

    /// True for the static-replay family of states.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            ConnectionState::StaticConnecting | ConnectionState::StaticConnected
        )
    }

    /// True when no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::DisconnectedForever)
    }

    /// Short human-readable label for status displays.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Initial => "Initial",
            ConnectionState::PingingServer => "Pinging server",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::StaticConnecting => "Loading snapshot",
            ConnectionState::StaticConnected => "Snapshot loaded",
            ConnectionState::DisconnectedForever => "Disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the backend script is currently producing deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptRunState {
    /// No run has started, or the last run finished.
    #[default]
    NotRunning,

    /// A run is in progress; deltas for the current run id are arriving.
    Running,

    /// The last run aborted with a compile error; the tree still holds the
    /// last good snapshot.
    CompilationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::StaticConnected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::PingingServer.is_connected());
        assert!(!ConnectionState::DisconnectedForever.is_connected());
    }

    #[test]
    fn test_is_static() {
        assert!(ConnectionState::StaticConnecting.is_static());
        assert!(ConnectionState::StaticConnected.is_static());
        assert!(!ConnectionState::Connected.is_static());
        assert!(!ConnectionState::Initial.is_static());
    }

    #[test]
    fn test_is_terminal() {
        assert!(ConnectionState::DisconnectedForever.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
    }

    #[test]
    fn test_display_label() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(
            ConnectionState::StaticConnecting.to_string(),
            "Loading snapshot"
        );
    }

    #[test]
    fn test_script_run_state_default() {
        assert_eq!(ScriptRunState::default(), ScriptRunState::NotRunning);
    }
}
