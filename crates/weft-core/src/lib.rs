//! # weft-core - Core Domain Types
//!
//! Foundation crate for the Weft client session runtime. Provides the wire
//! message model, element payload types, connection-state enums, error
//! handling, origin matching, and the logging bootstrap.
//!
//! This crate has **zero internal dependencies** -- it only depends on
//! external crates (serde, thiserror, tracing, regex, url).
//!
//! ## Public API
//!
//! ### Wire Model (`wire`)
//! - [`ForwardMsg`] / [`ForwardMsgPayload`] - Backend → client messages
//! - [`BackMsg`] / [`ClientState`] - Client → backend messages
//! - [`Delta`] / [`BlockConfig`] / [`BlockKind`] - Tree mutations
//! - [`WidgetValue`] / [`WidgetStateEntry`] - Widget-state snapshots
//! - [`ForwardMsgList`] - Static snapshot format
//!
//! ### Elements (`element`)
//! - [`Element`] - Closed enum over the renderable element kinds
//! - [`WidgetConfig`] - Shared widget metadata (id, form membership, default)
//! - [`DataTable`] / [`ColumnarTable`] - Tabular payloads with checked appends
//!
//! ### Session State (`state`)
//! - [`ConnectionState`] - Live/static connection phases
//! - [`ScriptRunState`] - Whether a backend run is in flight
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ### Origin Matching (`origin`)
//! - [`is_valid_origin()`] - Wildcard origin-pattern checks for host messages
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use weft_core::prelude::*;
//! ```

pub mod element;
pub mod error;
pub mod logging;
pub mod origin;
pub mod state;
pub mod wire;

/// Prelude for common imports used throughout all Weft client crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

// Re-export commonly used types at crate root for convenience
pub use element::{
    AlertElement, AlertFormat, ButtonElement, ChartElement, ChatInputElement, CheckboxElement,
    Column, ColumnValues, ColumnarTable, DataFrameElement, DataTable, Element, FileUploaderElement,
    JsonElement, MarkdownElement, MediaElement, MetricElement, NamedDataset, ProgressElement,
    SelectboxElement, SliderElement, TextElement, TextInputElement, WidgetConfig,
};
pub use error::{Error, Result, ResultExt};
pub use origin::is_valid_origin;
pub use state::{ConnectionState, ScriptRunState};
pub use wire::{
    BackMsg, BlockConfig, BlockKind, ClientState, Delta, ForwardMsg, ForwardMsgList,
    ForwardMsgMetadata, ForwardMsgPayload, HostConfig, NewSession, RunId, ScriptFinishedStatus,
    SessionStatus, WidgetStateEntry, WidgetValue, NO_RUN_ID,
};
