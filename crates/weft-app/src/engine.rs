//! # Engine
//!
//! Routes decoded forward messages into the app tree and widget state, and
//! tracks the run lifecycle: `newSession` starts a run, deltas mutate the
//! tree, and a full-run `scriptFinished` prunes stale nodes and ages the
//! connection's message cache.
//!
//! The engine owns the tree and the widget state manager for its session;
//! renderers read immutable snapshots through [`Engine::tree`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use weft_core::error::{Error, Result};
use weft_core::state::ScriptRunState;
use weft_core::wire::{
    BackMsg, BlockKind, ClientState, Delta, ForwardMsg, ForwardMsgPayload, RunId,
    ScriptFinishedStatus, SessionStatus, NO_RUN_ID,
};

use crate::app_tree::AppRoot;
use crate::debounce::Debouncer;
use crate::widget_state::{FormsData, WidgetBackend, WidgetStateManager};

/// How many runs a cached forward message stays alive without being
/// referenced before the connection evicts it.
pub const MAX_CACHED_MESSAGE_AGE: u32 = 2;

// ============================================================================
// Collaborators
// ============================================================================

/// The connection operations the engine needs; implemented by the session's
/// connection manager.
pub trait SessionControl: Send + Sync {
    /// Send a message to the backend. A no-op while disconnected.
    fn send_back_msg(&self, msg: BackMsg);

    /// Advance the forward-message cache's run counter, evicting entries
    /// older than `max_age` runs.
    fn increment_message_cache_run_count(&self, max_age: u32);
}

/// Bridges the widget state manager's outbound seam onto the connection:
/// rerun requests become `BackMsg::RerunScript` (debounced), and the latest
/// forms data is parked where the shell can read it.
pub struct SessionWidgetBackend {
    control: Arc<dyn SessionControl>,
    debouncer: Debouncer,
    forms_data: Arc<Mutex<FormsData>>,
}

impl SessionWidgetBackend {
    pub fn new(control: Arc<dyn SessionControl>, rerun_debounce: Duration) -> Self {
        Self {
            control,
            debouncer: Debouncer::new(rerun_debounce),
            forms_data: Arc::new(Mutex::new(FormsData::default())),
        }
    }

    /// Shared handle to the most recent forms data.
    pub fn forms_data_handle(&self) -> Arc<Mutex<FormsData>> {
        Arc::clone(&self.forms_data)
    }
}

impl WidgetBackend for SessionWidgetBackend {
    fn request_rerun(&self, client_state: ClientState) {
        let control = Arc::clone(&self.control);
        self.debouncer.call(move || {
            control.send_back_msg(BackMsg::RerunScript(client_state));
        });
    }

    fn forms_data_changed(&self, forms_data: FormsData) {
        *self.forms_data.lock().unwrap() = forms_data;
    }
}

// ============================================================================
// Engine
// ============================================================================

/// What a handled message changed, for consumers deciding whether to
/// re-render.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineUpdate {
    None,
    RunStarted { run_id: RunId },
    TreeChanged,
    RunFinished { status: ScriptFinishedStatus },
    SessionStatusChanged,
}

/// Per-session shell state: the app tree, the widget store, and the run
/// lifecycle.
pub struct Engine {
    control: Arc<dyn SessionControl>,
    tree: AppRoot,
    widgets: WidgetStateManager,
    forms_data: Arc<Mutex<FormsData>>,
    run_id: RunId,
    run_state: ScriptRunState,
    app_name: Option<String>,
    session_status: SessionStatus,
}

impl Engine {
    /// Create an engine with immediate (undebounced) rerun requests.
    pub fn new(control: Arc<dyn SessionControl>) -> Self {
        Self::with_rerun_debounce(control, Duration::ZERO)
    }

    /// Create an engine that coalesces rerun requests inside the window.
    pub fn with_rerun_debounce(control: Arc<dyn SessionControl>, window: Duration) -> Self {
        let backend = SessionWidgetBackend::new(Arc::clone(&control), window);
        let forms_data = backend.forms_data_handle();
        Self {
            control,
            tree: AppRoot::empty(None),
            widgets: WidgetStateManager::new(Box::new(backend)),
            forms_data,
            run_id: NO_RUN_ID.to_string(),
            run_state: ScriptRunState::NotRunning,
            app_name: None,
            session_status: SessionStatus::default(),
        }
    }

    /// Apply one decoded forward message.
    ///
    /// Messages must already be cache-resolved: a reference reaching the
    /// engine is a protocol error.
    pub fn handle_forward_msg(&mut self, msg: &ForwardMsg) -> Result<EngineUpdate> {
        match &msg.payload {
            ForwardMsgPayload::NewSession(session) => {
                self.run_id = session.script_run_id.clone();
                self.run_state = ScriptRunState::Running;
                self.app_name = Some(session.name.clone());
                debug!(
                    run_id = %self.run_id,
                    fragments = session.fragment_ids_this_run.len(),
                    "new script run",
                );
                Ok(EngineUpdate::RunStarted {
                    run_id: self.run_id.clone(),
                })
            }

            ForwardMsgPayload::Delta(delta) => {
                self.register_form_behavior(delta);
                self.tree = self.tree.apply_delta(&self.run_id, delta, &msg.metadata)?;
                Ok(EngineUpdate::TreeChanged)
            }

            ForwardMsgPayload::ScriptFinished(status) => {
                self.run_state = match status {
                    ScriptFinishedStatus::FinishedWithCompileError => {
                        ScriptRunState::CompilationError
                    }
                    _ => ScriptRunState::NotRunning,
                };

                if status.is_full_run_end() {
                    self.tree = self.tree.clear_stale_nodes(&self.run_id);
                    self.control
                        .increment_message_cache_run_count(MAX_CACHED_MESSAGE_AGE);

                    let active_ids = self
                        .tree
                        .get_elements()
                        .iter()
                        .filter_map(|node| node.element.widget_id().map(str::to_string))
                        .collect();
                    self.widgets.remove_stale_widgets(&active_ids);
                }

                Ok(EngineUpdate::RunFinished { status: *status })
            }

            ForwardMsgPayload::SessionStatusChanged(status) => {
                self.session_status = status.clone();
                Ok(EngineUpdate::SessionStatusChanged)
            }

            ForwardMsgPayload::RefHash { hash } => Err(Error::protocol(format!(
                "unresolved message reference '{hash}' reached the engine",
            ))),
        }
    }

    /// Forms declare their submit behavior through their block config; pick
    /// it up as the block lands in the tree.
    fn register_form_behavior(&mut self, delta: &Delta) {
        if let Delta::AddBlock { block } = delta {
            if let BlockKind::Form {
                form_id,
                clear_on_submit,
            } = &block.kind
            {
                self.widgets
                    .set_form_submit_behavior(form_id, *clear_on_submit);
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The current immutable tree snapshot.
    pub fn tree(&self) -> &AppRoot {
        &self.tree
    }

    pub fn widgets(&self) -> &WidgetStateManager {
        &self.widgets
    }

    pub fn widgets_mut(&mut self) -> &mut WidgetStateManager {
        &mut self.widgets
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_state(&self) -> ScriptRunState {
        self.run_state
    }

    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    pub fn session_status(&self) -> &SessionStatus {
        &self.session_status
    }

    /// The latest forms data reported by the widget state manager.
    pub fn forms_data(&self) -> FormsData {
        self.forms_data.lock().unwrap().clone()
    }

    /// Ask the backend to stop the running script.
    pub fn stop_script(&self) {
        self.control.send_back_msg(BackMsg::StopScript);
    }
}

// ============================================================================
// Tests
// ============================================================================
