//! # Widget State Manager
//!
//! The single source of truth for "what value does each widget currently
//! hold" and "when should the backend be told about it".
//!
//! Values set with `from_ui: true` are rerun-eligible: outside a form they
//! issue a rerun request through the injected [`WidgetBackend`]; inside a
//! form they accumulate as pending until [`WidgetStateManager::submit_form`]
//! flushes the whole form in one batch. Values set with `from_ui: false`
//! (initial sync on mount) update local state silently.
//!
//! The manager does not know how to transmit anything — transmission is the
//! backend collaborator's job; the manager only decides *when* to ask.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::warn;

use weft_core::element::WidgetConfig;
use weft_core::wire::{ClientState, WidgetStateEntry, WidgetValue};

use crate::element_state::ElementStateStore;

// ============================================================================
// Collaborators
// ============================================================================

/// Outbound seam injected by the app shell. `request_rerun` ultimately
/// serializes into a `BackMsg::RerunScript`; `forms_data_changed` feeds the
/// shell's form-submit-button enablement.
pub trait WidgetBackend: Send {
    fn request_rerun(&self, client_state: ClientState);
    fn forms_data_changed(&self, forms_data: FormsData);
}

/// The set of forms that currently hold unsubmitted widget changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormsData {
    pub forms_with_pending_changes: BTreeSet<String>,
}

// ============================================================================
// Widget metadata
// ============================================================================

/// The identity a setter needs: the stable widget id, form membership, and
/// the declared default used by clear-on-submit.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetInfo {
    pub id: String,
    pub form_id: Option<String>,
    pub default: Option<WidgetValue>,
}

impl WidgetInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            form_id: None,
            default: None,
        }
    }

    pub fn with_form(mut self, form_id: impl Into<String>) -> Self {
        self.form_id = Some(form_id.into());
        self
    }

    pub fn with_default(mut self, default: WidgetValue) -> Self {
        self.default = Some(default);
        self
    }
}

impl From<&WidgetConfig> for WidgetInfo {
    fn from(config: &WidgetConfig) -> Self {
        Self {
            id: config.id.clone(),
            form_id: config.form_id.clone(),
            default: config.default.clone(),
        }
    }
}

/// Whether a value change originated from user interaction. Only user
/// changes are rerun-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSource {
    pub from_ui: bool,
}

impl ValueSource {
    /// The change came from the user interacting with the widget.
    pub fn from_ui() -> Self {
        Self { from_ui: true }
    }

    /// Non-interactive sync (initial mount, host-driven restore).
    pub fn sync() -> Self {
        Self { from_ui: false }
    }
}

// ============================================================================
// Form state
// ============================================================================

#[derive(Debug, Default)]
struct FormState {
    clear_on_submit: bool,
    /// Widget metadata registered by setters; consulted on clear-on-submit.
    widgets: HashMap<String, WidgetInfo>,
    /// Values waiting for `submit_form`.
    pending: BTreeMap<String, WidgetValue>,
    /// Ids changed by the user since the last submit.
    dirty: BTreeSet<String>,
}

// ============================================================================
// WidgetStateManager
// ============================================================================

/// Keyed store of current widget values plus form batching and the
/// UI-only element-state scratch space.
pub struct WidgetStateManager {
    backend: Box<dyn WidgetBackend>,
    /// Committed values, keyed by widget id. Ordered so snapshots are
    /// deterministic.
    values: BTreeMap<String, WidgetValue>,
    forms: HashMap<String, FormState>,
    element_state: ElementStateStore,
}

impl std::fmt::Debug for WidgetStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetStateManager")
            .field("values", &self.values)
            .field("forms", &self.forms.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WidgetStateManager {
    pub fn new(backend: Box<dyn WidgetBackend>) -> Self {
        Self {
            backend,
            values: BTreeMap::new(),
            forms: HashMap::new(),
            element_state: ElementStateStore::new(),
        }
    }

    // ── Typed setters ─────────────────────────────────────────────────────

    pub fn set_bool_value(
        &mut self,
        widget: &WidgetInfo,
        value: bool,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Bool(value), source, fragment_id);
    }

    pub fn set_int_value(
        &mut self,
        widget: &WidgetInfo,
        value: i64,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Int(value), source, fragment_id);
    }

    pub fn set_double_value(
        &mut self,
        widget: &WidgetInfo,
        value: f64,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Double(value), source, fragment_id);
    }

    pub fn set_string_value(
        &mut self,
        widget: &WidgetInfo,
        value: impl Into<String>,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Str(value.into()), source, fragment_id);
    }

    pub fn set_int_array_value(
        &mut self,
        widget: &WidgetInfo,
        value: Vec<i64>,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::IntArray(value), source, fragment_id);
    }

    pub fn set_double_array_value(
        &mut self,
        widget: &WidgetInfo,
        value: Vec<f64>,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::DoubleArray(value), source, fragment_id);
    }

    pub fn set_string_array_value(
        &mut self,
        widget: &WidgetInfo,
        value: Vec<String>,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::StringArray(value), source, fragment_id);
    }

    pub fn set_bytes_value(
        &mut self,
        widget: &WidgetInfo,
        value: Vec<u8>,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Bytes(value), source, fragment_id);
    }

    /// Fire a one-shot pulse (button press). The pulse rides in exactly one
    /// outgoing snapshot and is then cleared.
    pub fn set_trigger_value(
        &mut self,
        widget: &WidgetInfo,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Trigger, source, fragment_id);
    }

    pub fn set_json_value(
        &mut self,
        widget: &WidgetInfo,
        value: serde_json::Value,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.set_value(widget, WidgetValue::Json(value), source, fragment_id);
    }

    // ── Typed getters ─────────────────────────────────────────────────────
    //
    // All getters return `None` when no value has ever been recorded for
    // the id, so callers can distinguish "never touched" from "explicitly
    // set to empty/zero".

    pub fn get_bool_value(&self, id: &str) -> Option<bool> {
        match self.current_value(id)? {
            WidgetValue::Bool(v) => Some(*v),
            other => Self::kind_mismatch(id, other, "bool"),
        }
    }

    pub fn get_int_value(&self, id: &str) -> Option<i64> {
        match self.current_value(id)? {
            WidgetValue::Int(v) => Some(*v),
            other => Self::kind_mismatch(id, other, "int"),
        }
    }

    pub fn get_double_value(&self, id: &str) -> Option<f64> {
        match self.current_value(id)? {
            WidgetValue::Double(v) => Some(*v),
            other => Self::kind_mismatch(id, other, "double"),
        }
    }

    pub fn get_string_value(&self, id: &str) -> Option<String> {
        match self.current_value(id)? {
            WidgetValue::Str(v) => Some(v.clone()),
            other => Self::kind_mismatch(id, other, "str"),
        }
    }

    pub fn get_int_array_value(&self, id: &str) -> Option<Vec<i64>> {
        match self.current_value(id)? {
            WidgetValue::IntArray(v) => Some(v.clone()),
            other => Self::kind_mismatch(id, other, "intArray"),
        }
    }

    pub fn get_double_array_value(&self, id: &str) -> Option<Vec<f64>> {
        match self.current_value(id)? {
            WidgetValue::DoubleArray(v) => Some(v.clone()),
            other => Self::kind_mismatch(id, other, "doubleArray"),
        }
    }

    pub fn get_string_array_value(&self, id: &str) -> Option<Vec<String>> {
        match self.current_value(id)? {
            WidgetValue::StringArray(v) => Some(v.clone()),
            other => Self::kind_mismatch(id, other, "stringArray"),
        }
    }

    pub fn get_bytes_value(&self, id: &str) -> Option<Vec<u8>> {
        match self.current_value(id)? {
            WidgetValue::Bytes(v) => Some(v.clone()),
            other => Self::kind_mismatch(id, other, "bytes"),
        }
    }

    pub fn get_json_value(&self, id: &str) -> Option<serde_json::Value> {
        match self.current_value(id)? {
            WidgetValue::Json(v) => Some(v.clone()),
            other => Self::kind_mismatch(id, other, "json"),
        }
    }

    /// The raw tagged value, pending-first, or `None` if never recorded.
    pub fn get_widget_value(&self, id: &str) -> Option<&WidgetValue> {
        self.current_value(id)
    }

    // ── Forms ─────────────────────────────────────────────────────────────

    /// Record whether `form_id` clears its widgets back to defaults on
    /// submit. Called by the shell when it encounters the form's block.
    pub fn set_form_submit_behavior(&mut self, form_id: &str, clear_on_submit: bool) {
        self.forms.entry(form_id.to_string()).or_default().clear_on_submit = clear_on_submit;
    }

    /// Flush all pending values of `form_id` and request exactly one rerun
    /// carrying them. With `clear_on_submit`, member widgets then revert to
    /// their declared defaults locally (no additional rerun).
    pub fn submit_form(&mut self, form_id: &str, fragment_id: Option<&str>) {
        let mut was_dirty = false;
        let mut clear_on_submit = false;

        if let Some(form) = self.forms.get_mut(form_id) {
            was_dirty = !form.dirty.is_empty();
            clear_on_submit = form.clear_on_submit;
            let pending = std::mem::take(&mut form.pending);
            form.dirty.clear();
            self.values.extend(pending);
        } else {
            warn!("submit_form called for unknown form '{form_id}'");
        }

        if was_dirty {
            self.emit_forms_data();
        }

        let client_state = self.build_client_state(fragment_id);
        self.backend.request_rerun(client_state);

        if clear_on_submit {
            self.revert_form_to_defaults(form_id);
        }
    }

    /// The forms currently holding unsubmitted user changes.
    pub fn forms_with_pending_changes(&self) -> FormsData {
        FormsData {
            forms_with_pending_changes: self
                .forms
                .iter()
                .filter(|(_, form)| !form.dirty.is_empty())
                .map(|(id, _)| id.clone())
                .collect(),
        }
    }

    // ── Element state ─────────────────────────────────────────────────────

    /// Record a UI-only flag for an element. Never serialized to the
    /// backend.
    pub fn set_element_state(&mut self, element_id: &str, key: &str, value: serde_json::Value) {
        self.element_state.set(element_id, key, value);
    }

    pub fn get_element_state(&self, element_id: &str, key: &str) -> Option<&serde_json::Value> {
        self.element_state.get(element_id, key)
    }

    pub fn clear_element_state(&mut self, element_id: &str) {
        self.element_state.clear_element(element_id);
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Drop committed values for widgets that no longer exist in the tree.
    ///
    /// Pending form values are deliberately kept: user input typed just
    /// before a rerun replaced the form is still flushed on submit, and the
    /// backend ignores unknown ids.
    pub fn remove_stale_widgets(&mut self, active_ids: &HashSet<String>) {
        self.values.retain(|id, _| active_ids.contains(id));
    }

    /// Build the outgoing snapshot: every committed value, in id order.
    /// Trigger pulses are consumed by the snapshot that carries them.
    pub fn build_client_state(&mut self, fragment_id: Option<&str>) -> ClientState {
        let widget_states: Vec<WidgetStateEntry> = self
            .values
            .iter()
            .map(|(id, value)| WidgetStateEntry {
                id: id.clone(),
                value: value.clone(),
            })
            .collect();

        self.values.retain(|_, value| !value.is_trigger());

        ClientState {
            widget_states,
            fragment_id: fragment_id.map(str::to_string),
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn set_value(
        &mut self,
        widget: &WidgetInfo,
        value: WidgetValue,
        source: ValueSource,
        fragment_id: Option<&str>,
    ) {
        self.check_kind(&widget.id, &value);

        match &widget.form_id {
            Some(form_id) => {
                let form = self.forms.entry(form_id.clone()).or_default();
                form.widgets.insert(widget.id.clone(), widget.clone());
                form.pending.insert(widget.id.clone(), value);
                if source.from_ui {
                    form.dirty.insert(widget.id.clone());
                    self.emit_forms_data();
                }
            }
            None => {
                self.values.insert(widget.id.clone(), value);
                if source.from_ui {
                    let client_state = self.build_client_state(fragment_id);
                    self.backend.request_rerun(client_state);
                }
            }
        }
    }

    fn current_value(&self, id: &str) -> Option<&WidgetValue> {
        for form in self.forms.values() {
            if let Some(value) = form.pending.get(id) {
                return Some(value);
            }
        }
        self.values.get(id)
    }

    /// A widget id's kind is fixed by the element schema for the lifetime
    /// of a run; changing it is a programmer error, not a runtime
    /// condition.
    fn check_kind(&self, id: &str, value: &WidgetValue) {
        if let Some(existing) = self.current_value(id) {
            assert!(
                existing.kind() == value.kind(),
                "widget '{}' already holds kind '{}', cannot set kind '{}'",
                id,
                existing.kind(),
                value.kind(),
            );
        }
    }

    fn kind_mismatch(id: &str, actual: &WidgetValue, requested: &str) -> ! {
        panic!(
            "widget '{}' holds kind '{}', requested '{}'",
            id,
            actual.kind(),
            requested,
        );
    }

    fn emit_forms_data(&self) {
        self.backend.forms_data_changed(self.forms_with_pending_changes());
    }

    fn revert_form_to_defaults(&mut self, form_id: &str) {
        let Some(form) = self.forms.get(form_id) else {
            return;
        };
        let reverts: Vec<(String, Option<WidgetValue>)> = form
            .widgets
            .values()
            .map(|w| (w.id.clone(), w.default.clone()))
            .collect();

        for (id, default) in reverts {
            match default {
                Some(value) => {
                    self.values.insert(id, value);
                }
                None => {
                    self.values.remove(&id);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every collaborator call for assertions.
    #[derive(Default)]
    struct Recording {
        reruns: Vec<ClientState>,
        forms_data: Vec<FormsData>,
    }

    #[derive(Clone, Default)]
    struct RecordingBackend {
        calls: Arc<Mutex<Recording>>,
    }

    impl WidgetBackend for RecordingBackend {
        fn request_rerun(&self, client_state: ClientState) {
            self.calls.lock().unwrap().reruns.push(client_state);
        }

        fn forms_data_changed(&self, forms_data: FormsData) {
            self.calls.lock().unwrap().forms_data.push(forms_data);
        }
    }

    fn manager() -> (WidgetStateManager, RecordingBackend) {
        let backend = RecordingBackend::default();
        let mgr = WidgetStateManager::new(Box::new(backend.clone()));
        (mgr, backend)
    }

    fn rerun_count(backend: &RecordingBackend) -> usize {
        backend.calls.lock().unwrap().reruns.len()
    }

    #[test]
    fn test_from_ui_set_outside_form_requests_rerun_once() {
        let (mut mgr, backend) = manager();
        mgr.set_double_value(&WidgetInfo::new("slider"), 0.7, ValueSource::from_ui(), None);

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.reruns.len(), 1);
        let state = &calls.reruns[0];
        assert_eq!(state.widget_states.len(), 1);
        assert_eq!(state.widget_states[0].id, "slider");
        assert_eq!(state.widget_states[0].value, WidgetValue::Double(0.7));
        assert!(state.fragment_id.is_none());
    }

    #[test]
    fn test_sync_set_does_not_request_rerun() {
        let (mut mgr, backend) = manager();
        mgr.set_bool_value(&WidgetInfo::new("check"), true, ValueSource::sync(), None);
        assert_eq!(rerun_count(&backend), 0);
        assert_eq!(mgr.get_bool_value("check"), Some(true));
    }

    #[test]
    fn test_fragment_id_is_carried_in_rerun() {
        let (mut mgr, backend) = manager();
        mgr.set_int_value(
            &WidgetInfo::new("counter"),
            3,
            ValueSource::from_ui(),
            Some("frag-9"),
        );
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.reruns[0].fragment_id.as_deref(), Some("frag-9"));
    }

    #[test]
    fn test_getter_returns_none_when_never_recorded() {
        let (mgr, _) = manager();
        assert_eq!(mgr.get_string_value("nobody"), None);
        assert_eq!(mgr.get_double_array_value("nobody"), None);
    }

    #[test]
    fn test_getter_distinguishes_empty_from_unset() {
        let (mut mgr, _) = manager();
        mgr.set_string_value(&WidgetInfo::new("t"), "", ValueSource::sync(), None);
        assert_eq!(mgr.get_string_value("t"), Some(String::new()));
    }

    #[test]
    #[should_panic(expected = "cannot set kind")]
    fn test_set_kind_mismatch_panics() {
        let (mut mgr, _) = manager();
        let widget = WidgetInfo::new("w");
        mgr.set_bool_value(&widget, true, ValueSource::sync(), None);
        mgr.set_int_value(&widget, 3, ValueSource::sync(), None);
    }

    #[test]
    #[should_panic(expected = "requested 'bool'")]
    fn test_get_kind_mismatch_panics() {
        let (mut mgr, _) = manager();
        mgr.set_int_value(&WidgetInfo::new("w"), 3, ValueSource::sync(), None);
        mgr.get_bool_value("w");
    }

    #[test]
    fn test_form_sets_do_not_individually_rerun() {
        let (mut mgr, backend) = manager();
        let in_form = |id: &str| WidgetInfo::new(id).with_form("f");

        mgr.set_string_value(&in_form("a"), "x", ValueSource::from_ui(), None);
        mgr.set_int_value(&in_form("b"), 2, ValueSource::from_ui(), None);
        mgr.set_bool_value(&in_form("c"), true, ValueSource::from_ui(), None);

        assert_eq!(rerun_count(&backend), 0, "form sets must not rerun");
        let forms = backend.calls.lock().unwrap().forms_data.last().cloned().unwrap();
        assert!(forms.forms_with_pending_changes.contains("f"));
    }

    #[test]
    fn test_submit_form_flushes_all_values_in_one_rerun() {
        let (mut mgr, backend) = manager();
        let in_form = |id: &str| WidgetInfo::new(id).with_form("f");

        mgr.set_string_value(&in_form("a"), "x", ValueSource::from_ui(), None);
        mgr.set_int_value(&in_form("b"), 2, ValueSource::from_ui(), None);
        mgr.set_bool_value(&in_form("c"), true, ValueSource::from_ui(), None);

        mgr.submit_form("f", None);

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.reruns.len(), 1, "submit must rerun exactly once");
        let ids: Vec<&str> = calls.reruns[0]
            .widget_states
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        // The form is clean again.
        let forms = calls.forms_data.last().unwrap();
        assert!(forms.forms_with_pending_changes.is_empty());
    }

    #[test]
    fn test_clear_on_submit_reverts_to_declared_defaults() {
        let (mut mgr, backend) = manager();
        mgr.set_form_submit_behavior("f", true);

        let name = WidgetInfo::new("name")
            .with_form("f")
            .with_default(WidgetValue::Str("anonymous".into()));
        let age = WidgetInfo::new("age").with_form("f");

        mgr.set_string_value(&name, "Ada", ValueSource::from_ui(), None);
        mgr.set_int_value(&age, 36, ValueSource::from_ui(), None);
        mgr.submit_form("f", None);

        // The submitted batch carried the user's values...
        let calls = backend.calls.lock().unwrap();
        let submitted = &calls.reruns[0].widget_states;
        assert!(submitted
            .iter()
            .any(|e| e.id == "name" && e.value == WidgetValue::Str("Ada".into())));
        drop(calls);

        // ...and afterwards reads come back as the declared defaults.
        assert_eq!(mgr.get_string_value("name"), Some("anonymous".into()));
        assert_eq!(mgr.get_int_value("age"), None, "no declared default clears");
        assert_eq!(rerun_count(&backend), 1, "revert must not rerun again");
    }

    #[test]
    fn test_submit_without_clear_keeps_values() {
        let (mut mgr, _) = manager();
        mgr.set_form_submit_behavior("f", false);
        let w = WidgetInfo::new("a").with_form("f");
        mgr.set_string_value(&w, "kept", ValueSource::from_ui(), None);
        mgr.submit_form("f", None);
        assert_eq!(mgr.get_string_value("a"), Some("kept".into()));
    }

    #[test]
    fn test_submit_unknown_form_still_reruns() {
        let (mut mgr, backend) = manager();
        mgr.submit_form("ghost", None);
        assert_eq!(rerun_count(&backend), 1);
    }

    #[test]
    fn test_trigger_is_consumed_by_one_snapshot() {
        let (mut mgr, backend) = manager();
        mgr.set_trigger_value(&WidgetInfo::new("go"), ValueSource::from_ui(), None);

        {
            let calls = backend.calls.lock().unwrap();
            assert_eq!(calls.reruns.len(), 1);
            assert!(calls.reruns[0]
                .widget_states
                .iter()
                .any(|e| e.id == "go" && e.value.is_trigger()));
        }

        // The pulse is gone from the next snapshot.
        mgr.set_int_value(&WidgetInfo::new("other"), 1, ValueSource::from_ui(), None);
        let calls = backend.calls.lock().unwrap();
        assert!(!calls.reruns[1].widget_states.iter().any(|e| e.id == "go"));
    }

    #[test]
    fn test_remove_stale_widgets_keeps_active_only() {
        let (mut mgr, _) = manager();
        mgr.set_int_value(&WidgetInfo::new("keep"), 1, ValueSource::sync(), None);
        mgr.set_int_value(&WidgetInfo::new("drop"), 2, ValueSource::sync(), None);

        let active: HashSet<String> = ["keep".to_string()].into_iter().collect();
        mgr.remove_stale_widgets(&active);

        assert_eq!(mgr.get_int_value("keep"), Some(1));
        assert_eq!(mgr.get_int_value("drop"), None);
    }

    #[test]
    fn test_remove_stale_widgets_keeps_pending_form_values() {
        let (mut mgr, _) = manager();
        let w = WidgetInfo::new("typed").with_form("f");
        mgr.set_string_value(&w, "draft", ValueSource::from_ui(), None);

        mgr.remove_stale_widgets(&HashSet::new());

        // Pending survives widget removal; it flushes on submit.
        assert_eq!(mgr.get_string_value("typed"), Some("draft".into()));
    }

    #[test]
    fn test_element_state_round_trip() {
        let (mut mgr, _) = manager();
        mgr.set_element_state("audio-1", "autoplayed", serde_json::json!(true));
        assert_eq!(
            mgr.get_element_state("audio-1", "autoplayed"),
            Some(&serde_json::json!(true))
        );
        mgr.clear_element_state("audio-1");
        assert_eq!(mgr.get_element_state("audio-1", "autoplayed"), None);
    }

    #[test]
    fn test_element_state_not_in_snapshots() {
        let (mut mgr, backend) = manager();
        mgr.set_element_state("video-1", "autoplayed", serde_json::json!(true));
        mgr.set_int_value(&WidgetInfo::new("w"), 1, ValueSource::from_ui(), None);

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.reruns[0].widget_states.len(), 1);
        assert_eq!(calls.reruns[0].widget_states[0].id, "w");
    }
}
