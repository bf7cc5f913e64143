//! # weft-app - App Tree and Widget State
//!
//! State layer of the Weft client runtime: the immutable app tree built from
//! the backend's delta stream, the widget state manager that decides when
//! the backend hears about user input, and the engine that routes decoded
//! messages between them.
//!
//! ## Public API
//!
//! ### App Tree (`app_tree`)
//! - [`AppRoot`] - Root snapshot with the fixed main/sidebar containers
//! - [`AppNode`] / [`BlockNode`] / [`ElementNode`] - Tree nodes
//!
//! ### Widget State (`widget_state`)
//! - [`WidgetStateManager`] - Values, forms, rerun scheduling
//! - [`WidgetBackend`] - Injected transmission seam
//! - [`WidgetInfo`] / [`ValueSource`] / [`FormsData`]
//!
//! ### Engine (`engine`)
//! - [`Engine`] - Message router and run lifecycle
//! - [`SessionControl`] - Connection operations the engine depends on
//!
//! ### Supporting modules
//! - [`element_state`] - UI-only per-element scratch state
//! - [`debounce`] - Trailing-edge coalescing for rerun requests

pub mod app_tree;
pub mod debounce;
pub mod element_state;
pub mod engine;
pub mod session_control;
pub mod widget_state;

pub use app_tree::{
    AppNode, AppRoot, BlockNode, ElementNode, ROOT_CONTAINER_MAIN, ROOT_CONTAINER_SIDEBAR,
};
pub use debounce::Debouncer;
pub use element_state::ElementStateStore;
pub use engine::{Engine, EngineUpdate, SessionControl, SessionWidgetBackend, MAX_CACHED_MESSAGE_AGE};
pub use widget_state::{FormsData, ValueSource, WidgetBackend, WidgetInfo, WidgetStateManager};
