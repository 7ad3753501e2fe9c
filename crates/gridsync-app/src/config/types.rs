//! Configuration types: host properties and component settings

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use gridsync_core::prelude::*;
use gridsync_core::{ColumnState, CssDict, DataReturnMode, GradientPalette, UpdateTrigger};
use gridsync_live::ReconnectPolicy;

// ─────────────────────────────────────────────────────────────────────────────
// Host properties
// ─────────────────────────────────────────────────────────────────────────────

/// Properties supplied by the host on construction and on every update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostProps {
    /// Serialized rows (a JSON array of objects, as text)
    #[serde(default)]
    pub row_data: Option<String>,

    /// Column and view configuration tree
    #[serde(default, rename = "gridOptions")]
    pub grid_options: Value,

    /// Original per-field type metadata, echoed back in every payload
    #[serde(default)]
    pub frame_dtypes: Value,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default)]
    pub width: Dimension,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default)]
    pub custom_css: CssDict,

    #[serde(default)]
    pub update_on: UpdateOn,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub manual_update: bool,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub allow_unsafe_jscode: bool,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub fit_columns_on_grid_load: bool,

    #[serde(default)]
    pub data_return_mode: DataReturnMode,

    #[serde(default)]
    pub columns_state: Option<ColumnState>,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub reload_data: bool,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub clear_currently_selected_rows: bool,

    #[serde(default)]
    pub row_id_col: Option<String>,

    #[serde(default)]
    pub websocket_connection_string: Option<String>,

    #[serde(default)]
    pub license_key: Option<String>,

    #[serde(default, deserialize_with = "deserialize_flag")]
    pub enable_enterprise_modules: bool,
}

impl HostProps {
    /// Parse host properties from JSON text.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the text is not a valid property object.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(format!("invalid host props: {e}")))
    }

    /// Whether the host pulls payloads itself instead of relying on triggers.
    ///
    /// Set by `manual_update` or by bit 1 of a bitmask `update_on`.
    pub fn is_manual(&self) -> bool {
        self.manual_update || self.update_on.manual
    }

    /// `gridOptions.columnDefs`, or `Null` when absent
    pub fn column_defs(&self) -> &Value {
        self.grid_options.get("columnDefs").unwrap_or(&Value::Null)
    }

    /// Container layout follows the content height instead of `height`.
    pub fn is_auto_height(&self) -> bool {
        self.grid_options.get("domLayout").and_then(Value::as_str) == Some("autoHeight")
    }

    /// Row indices the grid selects once its first rows are in
    pub fn pre_selected_rows(&self) -> Vec<usize> {
        self.grid_options
            .get("preSelectedRows")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_u64)
                    .map(|i| i as usize)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn default_height() -> u32 {
    400
}

fn default_theme() -> String {
    "streamlit".to_string()
}

/// Accept `true`/`false` as well as the integer flags some hosts send.
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got {other}"
        ))),
    }
}

/// Container width: a pixel count or any CSS length
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(u32),
    Css(String),
}

impl Default for Dimension {
    fn default() -> Self {
        Self::Css("100%".to_string())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixels(px) => write!(f, "{px}px"),
            Self::Css(css) => f.write_str(css),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UpdateOn
// ─────────────────────────────────────────────────────────────────────────────

/// Events behind the historical `update_on` bitmask, lowest bit first
const BITMASK_EVENTS: [(u64, &str); 4] = [
    (2, "cellValueChanged"),
    (4, "selectionChanged"),
    (8, "filterChanged"),
    (16, "sortChanged"),
];

/// Bit of the `update_on` bitmask meaning "manual update"
const BITMASK_MANUAL: u64 = 1;

/// The host's trigger set, normalized once into [`UpdateTrigger`]s.
///
/// Accepted shapes:
/// - `["selectionChanged", ["filterChanged", 300]]`
/// - the same list wrapped in one extra array
/// - an integer bitmask (`2 | 4 | 8 | 16`, bit `1` = manual)
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOn {
    pub triggers: Vec<UpdateTrigger>,
    pub manual: bool,
}

impl Default for UpdateOn {
    /// Every model change: edits, selection, filtering and sorting.
    fn default() -> Self {
        Self::from_bitmask(30)
    }
}

impl UpdateOn {
    pub fn from_triggers(triggers: Vec<UpdateTrigger>) -> Self {
        Self {
            triggers,
            manual: false,
        }
    }

    pub fn from_bitmask(mask: u64) -> Self {
        Self {
            triggers: BITMASK_EVENTS
                .iter()
                .filter(|(bit, _)| mask & bit != 0)
                .map(|(_, event)| UpdateTrigger::immediate(*event))
                .collect(),
            manual: mask & BITMASK_MANUAL != 0,
        }
    }

    /// Normalize any accepted `update_on` shape.
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Number(n) => n
                .as_u64()
                .map(Self::from_bitmask)
                .ok_or_else(|| format!("update_on bitmask must be a positive integer, got {n}")),
            Value::Array(items) => {
                let items = match items.as_slice() {
                    [Value::Array(inner)] if parse_trigger(&items[0]).is_err() => inner,
                    _ => items,
                };
                items
                    .iter()
                    .map(parse_trigger)
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Self::from_triggers)
            }
            other => Err(format!("unsupported update_on value: {other}")),
        }
    }
}

fn parse_trigger(item: &Value) -> std::result::Result<UpdateTrigger, String> {
    match item {
        Value::String(event) => Ok(UpdateTrigger::immediate(event.as_str())),
        Value::Array(pair) => match pair.as_slice() {
            [Value::String(event), delay] => delay
                .as_u64()
                .or_else(|| delay.as_f64().filter(|d| *d >= 0.0).map(|d| d.round() as u64))
                .map(|ms| UpdateTrigger::debounced(event.as_str(), ms))
                .ok_or_else(|| format!("invalid debounce delay for {event}: {delay}")),
            _ => Err(format!("expected [event, delay_ms], got {item}")),
        },
        other => Err(format!("invalid update trigger: {other}")),
    }
}

impl<'de> Deserialize<'de> for UpdateOn {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings (.gridsync/config.toml)
// ─────────────────────────────────────────────────────────────────────────────

/// Component settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub gradient: GradientSettings,

    #[serde(default)]
    pub live: LiveSettings,

    #[serde(default)]
    pub dispatch: DispatchSettings,
}

/// Endpoint colors for conditional formatting
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GradientSettings {
    /// Color of the smallest ranked value side
    #[serde(default = "default_low_color")]
    pub low_color: String,

    /// Color of the largest ranked value
    #[serde(default = "default_high_color")]
    pub high_color: String,
}

impl Default for GradientSettings {
    fn default() -> Self {
        Self {
            low_color: default_low_color(),
            high_color: default_high_color(),
        }
    }
}

impl GradientSettings {
    pub fn palette(&self) -> Result<GradientPalette> {
        GradientPalette::parse(&self.low_color, &self.high_color)
    }
}

fn default_low_color() -> String {
    "#FF0000".to_string()
}

fn default_high_color() -> String {
    "#00FF00".to_string()
}

/// Reconnect behavior of the live transaction channel
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LiveSettings {
    #[serde(default = "default_true")]
    pub reconnect: bool,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            reconnect: true,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl LiveSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Message loop settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DispatchSettings {
    /// Capacity of the component's message channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}
