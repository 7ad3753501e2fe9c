//! Domain types shared by the bridge, the dispatcher and the live channel

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A single grid row: field name to cell value.
pub type Row = Map<String, Value>;

/// Key under which a selected item's row index is reported to the host.
pub const ROW_INDEX_KEY: &str = "rowIndex";

// ─────────────────────────────────────────────────────────────────────────────
// GridSnapshot
// ─────────────────────────────────────────────────────────────────────────────

/// The dataset currently owned by the component.
///
/// Built from host-supplied serialized rows at construction and on every full
/// reload. The bridge never edits rows in place; it replaces the snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSnapshot {
    /// Rows in host order
    pub rows: Vec<Row>,
    /// Per-field type metadata the host uses to decode values back
    pub original_types: Value,
}

impl GridSnapshot {
    /// Parse the host's `row_data` JSON text.
    ///
    /// Anything other than a JSON array of objects is a fatal
    /// [`Error::RowData`].
    pub fn parse(row_data: &str, original_types: Value) -> Result<Self> {
        let rows: Vec<Row> = serde_json::from_str(row_data)
            .map_err(|e| Error::row_data(format!("expected a JSON array of rows: {e}")))?;
        Ok(Self {
            rows,
            original_types,
        })
    }

    /// Parse optional host input, treating absence as malformed input.
    pub fn from_host(row_data: Option<&str>, original_types: Value) -> Result<Self> {
        match row_data {
            Some(text) => Self::parse(text, original_types),
            None => Err(Error::row_data("row_data was not supplied")),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ColumnState
// ─────────────────────────────────────────────────────────────────────────────

/// Sort direction as reported in column state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl std::str::FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(Error::config(format!("unknown sort direction: {other}"))),
        }
    }
}

/// View attributes of one column (width, pin, sort, visibility, ...).
///
/// Only `colId` is interpreted by the component; everything else is carried
/// through untouched so the host can persist and replay it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStateEntry {
    pub col_id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl ColumnStateEntry {
    pub fn new(col_id: impl Into<String>) -> Self {
        Self {
            col_id: col_id.into(),
            attributes: Map::new(),
        }
    }

    pub fn sort(&self) -> Option<SortDirection> {
        self.attributes
            .get("sort")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    pub fn sort_index(&self) -> Option<u64> {
        self.attributes.get("sortIndex").and_then(Value::as_u64)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes
            .get("hide")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Ordered per-column view attributes, captured from and replayed into the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnState(pub Vec<ColumnStateEntry>);

impl ColumnState {
    pub fn entries(&self) -> &[ColumnStateEntry] {
        &self.0
    }

    pub fn get(&self, col_id: &str) -> Option<&ColumnStateEntry> {
        self.0.iter().find(|e| e.col_id == col_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UpdateTrigger
// ─────────────────────────────────────────────────────────────────────────────

/// When a view event should cause a payload to be sent to the host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpdateTrigger {
    /// Dispatch on every occurrence of the event
    Immediate { event: String },
    /// Dispatch once, `delay_ms` after the last occurrence of the event
    Debounced { event: String, delay_ms: u64 },
}

impl UpdateTrigger {
    pub fn immediate(event: impl Into<String>) -> Self {
        Self::Immediate {
            event: event.into(),
        }
    }

    pub fn debounced(event: impl Into<String>, delay_ms: u64) -> Self {
        Self::Debounced {
            event: event.into(),
            delay_ms,
        }
    }

    /// Name of the view event this trigger listens to
    pub fn event(&self) -> &str {
        match self {
            Self::Immediate { event } | Self::Debounced { event, .. } => event,
        }
    }

    /// Debounce window, `None` for immediate triggers
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Immediate { .. } => None,
            Self::Debounced { delay_ms, .. } => Some(Duration::from_millis(*delay_ms)),
        }
    }
}

impl fmt::Display for UpdateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate { event } => write!(f, "{event}"),
            Self::Debounced { event, delay_ms } => write!(f, "{event} (debounced {delay_ms}ms)"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DataReturnMode
// ─────────────────────────────────────────────────────────────────────────────

/// Which rows, in which order, the payload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataReturnMode {
    /// Every leaf row, ignoring filters, sorts and grouping
    All,
    /// Rows surviving the active filters, in store order
    Filtered,
    /// Rows surviving the active filters, in the current sort order
    #[default]
    FilteredSorted,
}

impl TryFrom<u8> for DataReturnMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::All),
            1 => Ok(Self::Filtered),
            2 => Ok(Self::FilteredSorted),
            other => Err(Error::config(format!("unknown data_return_mode: {other}"))),
        }
    }
}

impl From<DataReturnMode> for u8 {
    fn from(mode: DataReturnMode) -> Self {
        match mode {
            DataReturnMode::All => 0,
            DataReturnMode::Filtered => 1,
            DataReturnMode::FilteredSorted => 2,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReturnPayload
// ─────────────────────────────────────────────────────────────────────────────

/// The value handed to the host on every trigger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPayload {
    pub original_dtypes: Value,
    pub row_data: Vec<Row>,
    pub selected_rows: Vec<Row>,
    pub selected_items: Vec<Row>,
    pub col_state: ColumnState,
}

/// Build a selected item: `rowIndex` followed by the row's own fields.
///
/// A field literally named `rowIndex` in the data wins over the index.
pub fn selected_item(row_index: Option<usize>, data: &Row) -> Row {
    let mut item = Row::new();
    item.insert(
        ROW_INDEX_KEY.to_string(),
        row_index.map(Value::from).unwrap_or(Value::Null),
    );
    for (key, value) in data {
        item.insert(key.clone(), value.clone());
    }
    item
}

// ─────────────────────────────────────────────────────────────────────────────
// RowTransaction
// ─────────────────────────────────────────────────────────────────────────────

/// An incremental change set applied without a full replace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowTransaction {
    #[serde(default)]
    pub add: Vec<Row>,
    #[serde(default)]
    pub update: Vec<Row>,
    #[serde(default)]
    pub remove: Vec<Row>,
}

impl RowTransaction {
    pub fn update(rows: Vec<Row>) -> Self {
        Self {
            update: rows,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.update.len() + self.remove.len()
    }
}

/// Outcome of applying a [`RowTransaction`] to a view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionResult {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Patches whose row identity matched nothing
    pub unmatched: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_parse_rows() {
        let snapshot =
            GridSnapshot::parse(r#"[{"a":1},{"a":2}]"#, json!({"a": "int64"})).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.rows[1]["a"], json!(2));
        assert_eq!(snapshot.original_types, json!({"a": "int64"}));
    }

    #[test]
    fn test_snapshot_parse_rejects_non_array() {
        let err = GridSnapshot::parse(r#"{"a":1}"#, Value::Null).unwrap_err();
        assert!(matches!(err, Error::RowData { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_snapshot_missing_row_data_is_fatal() {
        let err = GridSnapshot::from_host(None, Value::Null).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_column_state_keeps_unknown_attributes() {
        let raw = json!([
            {"colId": "price", "width": 120, "pinned": "left", "sort": "desc", "sortIndex": 0},
            {"colId": "name", "hide": true}
        ]);
        let state: ColumnState = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(state.entries()[0].sort(), Some(SortDirection::Desc));
        assert_eq!(state.entries()[0].sort_index(), Some(0));
        assert!(state.get("name").unwrap().is_hidden());
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn test_data_return_mode_from_int() {
        let mode: DataReturnMode = serde_json::from_value(json!(1)).unwrap();
        assert_eq!(mode, DataReturnMode::Filtered);
        assert!(serde_json::from_value::<DataReturnMode>(json!(7)).is_err());
        assert_eq!(serde_json::to_value(DataReturnMode::All).unwrap(), json!(0));
    }

    #[test]
    fn test_payload_uses_host_field_names() {
        let payload = ReturnPayload::default();
        let value = serde_json::to_value(&payload).unwrap();
        for key in [
            "originalDtypes",
            "rowData",
            "selectedRows",
            "selectedItems",
            "colState",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_selected_item_prefixes_row_index() {
        let mut data = Row::new();
        data.insert("v".into(), json!(10));
        let item = selected_item(Some(3), &data);
        assert_eq!(item[ROW_INDEX_KEY], json!(3));
        assert_eq!(item["v"], json!(10));

        let hidden = selected_item(None, &data);
        assert_eq!(hidden[ROW_INDEX_KEY], Value::Null);
    }

    #[test]
    fn test_trigger_delay() {
        assert_eq!(UpdateTrigger::immediate("sortChanged").delay(), None);
        assert_eq!(
            UpdateTrigger::debounced("cellValueChanged", 250).delay(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(UpdateTrigger::debounced("x", 5).event(), "x");
    }
}
