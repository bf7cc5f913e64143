//! # Element Domain Types
//!
//! Typed payloads for the leaves of the app tree, as serialized by the weft
//! backend. An [`Element`] is either a display element (text, alert, chart,
//! ...) or a widget element (button, slider, ...). Widget elements embed a
//! [`WidgetConfig`] carrying the backend-assigned stable widget id.
//!
//! The element kind is a closed enum rather than a string discriminant:
//! a payload kind this client does not know about fails at decode time,
//! which is the desired behavior for a client/server version skew.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::wire::WidgetValue;

// ============================================================================
// Element
// ============================================================================

/// A single renderable element, decoded from a `newElement` delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "camelCase")]
pub enum Element {
    /// Placeholder that renders nothing but holds a tree slot.
    Empty,
    Text(TextElement),
    Markdown(MarkdownElement),
    Alert(AlertElement),
    Json(JsonElement),
    Metric(MetricElement),
    Progress(ProgressElement),
    DataFrame(DataFrameElement),
    Chart(ChartElement),
    Audio(MediaElement),
    Video(MediaElement),
    Button(ButtonElement),
    Checkbox(CheckboxElement),
    Slider(SliderElement),
    TextInput(TextInputElement),
    Selectbox(SelectboxElement),
    FileUploader(FileUploaderElement),
    ChatInput(ChatInputElement),
}

impl Element {
    /// The wire name of this element kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Empty => "empty",
            Element::Text(_) => "text",
            Element::Markdown(_) => "markdown",
            Element::Alert(_) => "alert",
            Element::Json(_) => "json",
            Element::Metric(_) => "metric",
            Element::Progress(_) => "progress",
            Element::DataFrame(_) => "dataFrame",
            Element::Chart(_) => "chart",
            Element::Audio(_) => "audio",
            Element::Video(_) => "video",
            Element::Button(_) => "button",
            Element::Checkbox(_) => "checkbox",
            Element::Slider(_) => "slider",
            Element::TextInput(_) => "textInput",
            Element::Selectbox(_) => "selectbox",
            Element::FileUploader(_) => "fileUploader",
            Element::ChatInput(_) => "chatInput",
        }
    }

    /// The widget configuration, for widget elements.
    pub fn widget_config(&self) -> Option<&WidgetConfig> {
        match self {
            Element::Button(e) => Some(&e.widget),
            Element::Checkbox(e) => Some(&e.widget),
            Element::Slider(e) => Some(&e.widget),
            Element::TextInput(e) => Some(&e.widget),
            Element::Selectbox(e) => Some(&e.widget),
            Element::FileUploader(e) => Some(&e.widget),
            Element::ChatInput(e) => Some(&e.widget),
            _ => None,
        }
    }

    /// The stable widget id, for widget elements.
    pub fn widget_id(&self) -> Option<&str> {
        self.widget_config().map(|w| w.id.as_str())
    }

    /// True when this element accepts user input.
    pub fn is_widget(&self) -> bool {
        self.widget_config().is_some()
    }

    /// True when this element is a legal `addRows` target.
    pub fn accepts_add_rows(&self) -> bool {
        matches!(self, Element::DataFrame(_))
    }

    /// True when this element is a legal `addRowsColumnar` target.
    pub fn accepts_columnar_add_rows(&self) -> bool {
        matches!(self, Element::Chart(_))
    }
}

// ============================================================================
// WidgetConfig
// ============================================================================

/// Widget metadata shared by all widget elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfig {
    /// Stable widget id, assigned by the backend and unique per widget
    /// instance within a run.
    pub id: String,

    /// Id of the enclosing form, when the widget submits with a form
    /// instead of individually.
    #[serde(default)]
    pub form_id: Option<String>,

    /// Declared default value; widgets revert to this on clear-on-submit.
    #[serde(default)]
    pub default: Option<WidgetValue>,

    #[serde(default)]
    pub disabled: bool,
}

impl WidgetConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            form_id: None,
            default: None,
            disabled: false,
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

// ============================================================================
// Display elements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownElement {
    pub body: String,
    #[serde(default)]
    pub allow_html: bool,
}

/// Severity styling for an alert box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertFormat {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertElement {
    pub body: String,
    pub format: AlertFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonElement {
    pub body: serde_json::Value,
    #[serde(default)]
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricElement {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub delta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressElement {
    /// Completion in `[0.0, 1.0]`.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElement {
    /// Relative or absolute media URL; relative URLs resolve against the
    /// session endpoints.
    pub url: String,
    #[serde(default)]
    pub autoplay: bool,
}

// ============================================================================
// Tabular data
// ============================================================================

/// Row-major table payload carried by [`DataFrameElement`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl DataTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append another table's rows to this one.
    ///
    /// The incoming table must carry the same column list in the same
    /// order; every incoming row must match the column arity.
    pub fn append(&mut self, other: &DataTable) -> Result<()> {
        if self.columns != other.columns {
            return Err(Error::protocol(format!(
                "addRows column mismatch: expected {:?}, got {:?}",
                self.columns, other.columns
            )));
        }
        for row in &other.rows {
            if row.len() != self.columns.len() {
                return Err(Error::protocol(format!(
                    "addRows row arity {} does not match {} columns",
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        self.rows.extend(other.rows.iter().cloned());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrameElement {
    pub data: DataTable,
}

/// Typed column storage for the columnar append path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "camelCase")]
pub enum ColumnValues {
    Int(Vec<i64>),
    Double(Vec<f64>),
    Str(Vec<String>),
    Bool(Vec<bool>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
            ColumnValues::Str(v) => v.len(),
            ColumnValues::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dtype(&self) -> &'static str {
        match self {
            ColumnValues::Int(_) => "int",
            ColumnValues::Double(_) => "double",
            ColumnValues::Str(_) => "str",
            ColumnValues::Bool(_) => "bool",
        }
    }

    fn append(&mut self, other: &ColumnValues) -> Result<()> {
        match (self, other) {
            (ColumnValues::Int(a), ColumnValues::Int(b)) => a.extend_from_slice(b),
            (ColumnValues::Double(a), ColumnValues::Double(b)) => a.extend_from_slice(b),
            (ColumnValues::Str(a), ColumnValues::Str(b)) => a.extend_from_slice(b),
            (ColumnValues::Bool(a), ColumnValues::Bool(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(Error::protocol(format!(
                    "addRowsColumnar dtype mismatch: {} vs {}",
                    a.dtype(),
                    b.dtype()
                )))
            }
        }
        Ok(())
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// Column-major table payload carried by [`ChartElement`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnarTable {
    pub columns: Vec<Column>,
}

impl ColumnarTable {
    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Append another table column-wise.
    ///
    /// Columns are matched by name; every column must be present in both
    /// tables with the same dtype, and the incoming columns must all have
    /// the same length.
    pub fn append(&mut self, other: &ColumnarTable) -> Result<()> {
        if self.columns.len() != other.columns.len() {
            return Err(Error::protocol(format!(
                "addRowsColumnar column count mismatch: {} vs {}",
                self.columns.len(),
                other.columns.len()
            )));
        }

        let incoming_rows = other.num_rows();
        for col in &other.columns {
            if col.values.len() != incoming_rows {
                return Err(Error::protocol(format!(
                    "addRowsColumnar ragged columns: '{}' has {} rows, expected {}",
                    col.name,
                    col.values.len(),
                    incoming_rows
                )));
            }
        }

        for col in &mut self.columns {
            let incoming = other
                .columns
                .iter()
                .find(|c| c.name == col.name)
                .ok_or_else(|| {
                    Error::protocol(format!("addRowsColumnar missing column '{}'", col.name))
                })?;
            col.values.append(&incoming.values)?;
        }
        Ok(())
    }
}

/// A columnar dataset addressed by name within a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedDataset {
    #[serde(default)]
    pub name: Option<String>,
    pub data: ColumnarTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartElement {
    /// Declarative chart spec, passed through to the renderer untouched.
    pub spec: String,
    #[serde(default)]
    pub data: ColumnarTable,
    #[serde(default)]
    pub datasets: Vec<NamedDataset>,
}

impl ChartElement {
    /// Append columnar rows to the dataset addressed by `incoming.name`.
    ///
    /// If the chart has exactly one named dataset, that one is used; else
    /// the name must match a dataset; else rows land on the inline `data`.
    pub fn append_dataset(&mut self, incoming: &NamedDataset) -> Result<()> {
        let target = if self.datasets.len() == 1 {
            Some(&mut self.datasets[0])
        } else {
            let name = incoming.name.as_deref();
            self.datasets
                .iter_mut()
                .find(|ds| name.is_some() && ds.name.as_deref() == name)
        };

        match target {
            Some(ds) => ds.data.append(&incoming.data),
            None if self.data.columns.is_empty() => {
                // Nothing to append onto; adopt the incoming rows as data.
                self.data = incoming.data.clone();
                Ok(())
            }
            None => self.data.append(&incoming.data),
        }
    }
}

// ============================================================================
// Widget elements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonElement {
    pub widget: WidgetConfig,
    pub label: String,
    /// True for the button that submits its enclosing form.
    #[serde(default)]
    pub is_form_submitter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckboxElement {
    pub widget: WidgetConfig,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderElement {
    pub widget: WidgetConfig,
    pub label: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInputElement {
    pub widget: WidgetConfig,
    pub label: String,
    #[serde(default)]
    pub max_chars: Option<u32>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectboxElement {
    pub widget: WidgetConfig,
    pub label: String,
    pub options: Vec<String>,
}

fn default_max_upload_size_mb() -> u32 {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploaderElement {
    pub widget: WidgetConfig,
    pub label: String,
    /// Allowed file extensions (lowercase, no dot). Empty = any.
    #[serde(default)]
    pub allowed_types: Vec<String>,
    #[serde(default = "default_max_upload_size_mb")]
    pub max_upload_size_mb: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatInputElement {
    pub widget: WidgetConfig,
    #[serde(default)]
    pub placeholder: String,
    /// Whether attachments may ride along with the message text.
    #[serde(default)]
    pub accept_files: bool,
}

// ============================================================================
// Tests
// ============================================================================
