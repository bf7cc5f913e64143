//! Wire message model for the weft session protocol.
//!
//! The protocol is JSON-framed. `ForwardMsg` flows backend → client (session
//! setup, deltas, run lifecycle); `BackMsg` flows client → backend (rerun
//! requests carrying widget-state snapshots). The schema is fixed by the
//! backend; this module only decodes/encodes it.
//!
//! All enums here are closed: an unknown payload or delta kind fails to
//! decode, and the decode error is treated as fatal (client/server version
//! skew) rather than skipped.

use serde::{Deserialize, Serialize};

use crate::element::{DataTable, Element, NamedDataset};
use crate::error::{Error, Result};

/// Identifier of one backend script execution. Every tree node remembers the
/// run that produced it; end-of-run pruning compares against the current one.
pub type RunId = String;

/// Run id used by nodes that precede the first `newSession`.
pub const NO_RUN_ID: &str = "";

// ============================================================================
// ForwardMsg
// ============================================================================

/// Delivery metadata attached to every forward message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardMsgMetadata {
    /// True when the backend wants this message cached by content hash so a
    /// later run can reference it instead of resending identical bytes.
    #[serde(default)]
    pub cacheable: bool,

    /// Path of child indices from the tree root to the target node.
    #[serde(default)]
    pub delta_path: Vec<usize>,
}

/// A backend → client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardMsg {
    /// Content hash, present when the message is cacheable or is itself a
    /// reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(default)]
    pub metadata: ForwardMsgMetadata,

    #[serde(flatten)]
    pub payload: ForwardMsgPayload,
}

impl ForwardMsg {
    /// Decode one message from its serialized bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::decode(format!("bad ForwardMsg frame: {e}")))
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::decode(format!("encode ForwardMsg: {e}")))
    }

    /// True when this message is a hash-only reference to a cached body.
    pub fn is_reference(&self) -> bool {
        matches!(self.payload, ForwardMsgPayload::RefHash { .. })
    }
}

/// Payload variants of a [`ForwardMsg`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ForwardMsgPayload {
    /// A new script run is starting.
    NewSession(NewSession),

    /// A tree mutation for the current run.
    Delta(Delta),

    /// The current script run ended.
    ScriptFinished(ScriptFinishedStatus),

    /// Backend session status changed (run-on-save toggles etc.).
    SessionStatusChanged(SessionStatus),

    /// Reference to a previously sent message, by content hash.
    RefHash { hash: String },
}

/// Payload of `newSession`: identifies the run and the app being run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub script_run_id: RunId,
    pub name: String,
    pub main_script_path: String,

    /// When non-empty, this run reruns only the named fragments; the rest of
    /// the tree is untouched.
    #[serde(default)]
    pub fragment_ids_this_run: Vec<String>,
}

/// How a script run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptFinishedStatus {
    FinishedSuccessfully,
    FinishedWithCompileError,
    /// The run was cut short because a fresh rerun request superseded it.
    FinishedEarlyForRerun,
    FinishedFragmentRunSuccessfully,
}

impl ScriptFinishedStatus {
    /// True when this status completes a full run: stale nodes are pruned
    /// and the message cache ages by one run. Early-rerun and fragment
    /// completions leave the tree alone.
    pub fn is_full_run_end(&self) -> bool {
        matches!(
            self,
            ScriptFinishedStatus::FinishedSuccessfully
                | ScriptFinishedStatus::FinishedWithCompileError
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    #[serde(default)]
    pub run_on_save: bool,
    #[serde(default)]
    pub script_is_running: bool,
}

/// An ordered list of forward messages — the static snapshot format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForwardMsgList {
    pub messages: Vec<ForwardMsg>,
}

impl ForwardMsgList {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::decode(format!("bad ForwardMsgList blob: {e}")))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::decode(format!("encode ForwardMsgList: {e}")))
    }
}

// ============================================================================
// Delta
// ============================================================================

/// A single tree mutation. The target path travels in the enclosing
/// message's [`ForwardMsgMetadata::delta_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Delta {
    /// Insert or replace the leaf at the path.
    NewElement { element: Element },

    /// Insert or replace the branch at the path. Replacing an existing
    /// branch keeps its children.
    AddBlock { block: BlockConfig },

    /// Append row-major rows to the data-frame leaf at the path.
    AddRows { rows: DataTable },

    /// Append a columnar dataset to the chart leaf at the path.
    AddRowsColumnar { dataset: NamedDataset },
}

/// Layout metadata carried by a branch node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockConfig {
    /// When set, end-of-run pruning keeps this branch alive even with zero
    /// surviving children (top-level containers, placeholders).
    #[serde(default)]
    pub allow_empty: bool,

    #[serde(default)]
    pub kind: BlockKind,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            allow_empty: false,
            kind: BlockKind::Vertical,
        }
    }
}

impl BlockConfig {
    /// Shorthand for a vertical container that survives empty.
    pub fn allow_empty() -> Self {
        Self {
            allow_empty: true,
            kind: BlockKind::Vertical,
        }
    }

    /// The form id, when this block is a form container.
    pub fn form_id(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Form { form_id, .. } => Some(form_id),
            _ => None,
        }
    }
}

/// The layout role of a branch node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockKind {
    #[default]
    Vertical,
    Horizontal,
    Column {
        weight: f64,
    },
    Expandable {
        label: String,
        expanded: bool,
    },
    Form {
        form_id: String,
        clear_on_submit: bool,
    },
}

// ============================================================================
// BackMsg
// ============================================================================

/// A client → backend message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum BackMsg {
    /// Ask the backend to rerun the script with this widget-state snapshot.
    RerunScript(ClientState),

    /// Stop the currently running script.
    StopScript,

    /// Clear the backend's forward-message cache.
    ClearCache,

    /// Debug hook: ask the backend to drop the websocket (exercises the
    /// reconnect path end to end).
    DebugDisconnectWebsocket,
}

impl BackMsg {
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::decode(format!("encode BackMsg: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::decode(format!("bad BackMsg frame: {e}")))
    }
}

/// The widget-state snapshot carried by a rerun request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    #[serde(default)]
    pub widget_states: Vec<WidgetStateEntry>,

    /// When set, only the named fragment reruns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_id: Option<String>,
}

/// One widget's current value, keyed by its stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetStateEntry {
    pub id: String,
    pub value: WidgetValue,
}

/// A widget value, tagged by kind.
///
/// A widget id's kind is fixed by the element schema for the lifetime of a
/// run; the state manager treats a kind mismatch as a programmer error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum WidgetValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    IntArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    Bytes(Vec<u8>),
    /// A one-shot pulse (button press). Consumed by the snapshot that
    /// carries it.
    Trigger,
    /// Structured value for composite widgets (chat input with attachments).
    Json(serde_json::Value),
}

impl WidgetValue {
    /// The kind name, used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WidgetValue::Bool(_) => "bool",
            WidgetValue::Int(_) => "int",
            WidgetValue::Double(_) => "double",
            WidgetValue::Str(_) => "str",
            WidgetValue::IntArray(_) => "intArray",
            WidgetValue::DoubleArray(_) => "doubleArray",
            WidgetValue::StringArray(_) => "stringArray",
            WidgetValue::Bytes(_) => "bytes",
            WidgetValue::Trigger => "trigger",
            WidgetValue::Json(_) => "json",
        }
    }

    /// True for pulse values that must not survive the snapshot that
    /// carries them.
    pub fn is_trigger(&self) -> bool {
        matches!(self, WidgetValue::Trigger)
    }
}

// ============================================================================
// Host configuration
// ============================================================================

/// Host-provided configuration fetched during connection setup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Origin patterns allowed to exchange cross-frame messages with this
    /// session. May contain hostname wildcards.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// When true, the connection waits for a host-supplied auth token
    /// before the websocket handshake.
    #[serde(default)]
    pub use_external_auth_token: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_msg_decode_delta() {
        let json = br#"{
            "metadata": {"cacheable": false, "deltaPath": [0, 1]},
            "type": "delta",
            "body": {"kind": "newElement", "element": {"type": "text", "config": {"body": "hi"}}}
        }"#;
        let msg = ForwardMsg::decode(json).unwrap();
        assert_eq!(msg.metadata.delta_path, vec![0, 1]);
        assert!(!msg.is_reference());
        match msg.payload {
            ForwardMsgPayload::Delta(Delta::NewElement { element }) => {
                assert_eq!(element.kind(), "text");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_forward_msg_decode_ref_hash() {
        let json = br#"{"type": "refHash", "body": {"hash": "abc123"}}"#;
        let msg = ForwardMsg::decode(json).unwrap();
        assert!(msg.is_reference());
        assert!(msg.metadata.delta_path.is_empty());
    }

    #[test]
    fn test_forward_msg_unknown_payload_is_fatal_decode_error() {
        let json = br#"{"type": "teleport", "body": {}}"#;
        let err = ForwardMsg::decode(json).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_forward_msg_roundtrip() {
        let msg = ForwardMsg {
            hash: Some("h1".into()),
            metadata: ForwardMsgMetadata {
                cacheable: true,
                delta_path: vec![0, 3],
            },
            payload: ForwardMsgPayload::ScriptFinished(
                ScriptFinishedStatus::FinishedSuccessfully,
            ),
        };
        let bytes = msg.encode().unwrap();
        let decoded = ForwardMsg::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_forward_msg_list_roundtrip() {
        let list = ForwardMsgList {
            messages: vec![
                ForwardMsg {
                    hash: None,
                    metadata: ForwardMsgMetadata::default(),
                    payload: ForwardMsgPayload::NewSession(NewSession {
                        script_run_id: "run-1".into(),
                        name: "demo".into(),
                        main_script_path: "app.py".into(),
                        fragment_ids_this_run: vec![],
                    }),
                },
                ForwardMsg {
                    hash: None,
                    metadata: ForwardMsgMetadata::default(),
                    payload: ForwardMsgPayload::ScriptFinished(
                        ScriptFinishedStatus::FinishedSuccessfully,
                    ),
                },
            ],
        };
        let bytes = list.encode().unwrap();
        let decoded = ForwardMsgList::decode(&bytes).unwrap();
        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded, list);
    }

    #[test]
    fn test_script_finished_full_run_end() {
        assert!(ScriptFinishedStatus::FinishedSuccessfully.is_full_run_end());
        assert!(ScriptFinishedStatus::FinishedWithCompileError.is_full_run_end());
        assert!(!ScriptFinishedStatus::FinishedEarlyForRerun.is_full_run_end());
        assert!(!ScriptFinishedStatus::FinishedFragmentRunSuccessfully.is_full_run_end());
    }

    #[test]
    fn test_back_msg_rerun_roundtrip() {
        let msg = BackMsg::RerunScript(ClientState {
            widget_states: vec![WidgetStateEntry {
                id: "w1".into(),
                value: WidgetValue::Double(0.5),
            }],
            fragment_id: Some("frag-1".into()),
        });
        let bytes = msg.encode().unwrap();
        assert_eq!(BackMsg::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_block_config_form_id() {
        let block = BlockConfig {
            allow_empty: false,
            kind: BlockKind::Form {
                form_id: "f1".into(),
                clear_on_submit: true,
            },
        };
        assert_eq!(block.form_id(), Some("f1"));
        assert_eq!(BlockConfig::default().form_id(), None);
    }

    #[test]
    fn test_widget_value_kind_names() {
        assert_eq!(WidgetValue::Bool(true).kind(), "bool");
        assert_eq!(WidgetValue::Trigger.kind(), "trigger");
        assert!(WidgetValue::Trigger.is_trigger());
        assert!(!WidgetValue::Int(3).is_trigger());
    }

    #[test]
    fn test_host_config_defaults() {
        let config: HostConfig = serde_json::from_str("{}").unwrap();
        assert!(config.allowed_origins.is_empty());
        assert!(!config.use_external_auth_token);
    }
}
