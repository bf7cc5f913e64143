//! Events surfaced by the connection layer.

use std::time::Duration;

use weft_core::state::ConnectionState;
use weft_core::wire::{ForwardMsg, HostConfig};

/// Everything the app shell hears from the connection layer, in order, over
/// one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The connection moved to a new phase. `message` carries the error
    /// text for failure transitions.
    StateChanged {
        state: ConnectionState,
        message: Option<String>,
    },

    /// A decoded, cache-resolved forward message. Delivered strictly in
    /// arrival order.
    Message(Box<ForwardMsg>),

    /// A reconnect attempt is scheduled. Emitted by the live connection on
    /// every failed round; the manager turns the threshold crossing into a
    /// user-visible notice.
    Retry {
        total_tries: u32,
        message: String,
        next_delay: Duration,
    },

    /// A user-visible connection problem that does not change state.
    Error { message: String },

    /// Host configuration received during connection setup.
    HostConfig(HostConfig),
}

impl SessionEvent {
    pub fn state_changed(state: ConnectionState) -> Self {
        Self::StateChanged {
            state,
            message: None,
        }
    }

    pub fn state_changed_with_error(state: ConnectionState, message: impl Into<String>) -> Self {
        Self::StateChanged {
            state,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
