//! Built-in column types and cell presentation
//!
//! The component ships a table of named column types (filters, value
//! formatters and the gradient cell style). The table sits beneath the host's
//! own `gridOptions.columnTypes`: a host entry with the same name wins.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use gridsync_core::format::{self, DATE_PATTERN, SHORT_DATE_TIME_PATTERN};
use gridsync_core::prelude::*;
use gridsync_core::{
    BehaviorRegistry, BoundBehavior, ConfigMap, ConfigNode, FnBehavior, GradientColorEngine, Row,
    CONDITIONAL_FORMAT_TYPE,
};

/// Registry name of the gradient cell style behavior
pub const GRADIENT_CELL_STYLE: &str = "gradientCellStyle";

const COLUMN_TYPES_KEY: &str = "columnTypes";

/// Register the cell style behavior backed by this component's gradient
pub fn register_gradient_style(registry: &mut BehaviorRegistry, engine: Arc<GradientColorEngine>) {
    registry.register(FnBehavior::new(GRADIENT_CELL_STYLE, move |params| {
        let value = params.get("value").unwrap_or(&Value::Null);
        engine.cell_style(value).unwrap_or(Value::Null)
    }));
}

fn bound(registry: &BehaviorRegistry, name: &str) -> ConfigNode {
    match registry.get(name) {
        Some(behavior) => ConfigNode::Behavior(BoundBehavior {
            behavior,
            source: format!("builtin {name}"),
        }),
        None => {
            warn!("Built-in column type refers to unregistered behavior {name:?}");
            ConfigNode::Null
        }
    }
}

fn fixed_date_format(name: &str, pattern: &'static str) -> ConfigNode {
    let behavior = FnBehavior::new(name, move |params: &Value| {
        let value = params.get("value").unwrap_or(&Value::Null);
        Value::String(format::format_date(value, pattern))
    });
    ConfigNode::Behavior(BoundBehavior {
        behavior: Arc::new(behavior),
        source: format!("builtin {name}"),
    })
}

fn entry(pairs: impl IntoIterator<Item = (&'static str, ConfigNode)>) -> ConfigNode {
    ConfigNode::Object(
        pairs
            .into_iter()
            .map(|(key, node)| (key.to_string(), node))
            .collect(),
    )
}

fn formatter(node: ConfigNode) -> ConfigNode {
    entry([("valueFormatter", node)])
}

/// The built-in column type table, bound against `registry`
pub fn builtin_column_types(registry: &BehaviorRegistry) -> ConfigMap {
    let mut types = ConfigMap::new();
    types.insert(
        "dateColumnFilter".to_string(),
        entry([
            ("filter", ConfigNode::String("agDateColumnFilter".into())),
            (
                "filterParams",
                entry([("comparator", bound(registry, "compareIsoDates"))]),
            ),
        ]),
    );
    types.insert(
        "numberColumnFilter".to_string(),
        entry([("filter", ConfigNode::String("agNumberColumnFilter".into()))]),
    );
    types.insert(
        "shortDateTimeFormat".to_string(),
        formatter(fixed_date_format("shortDateTime", SHORT_DATE_TIME_PATTERN)),
    );
    types.insert(
        "customDateFormat".to_string(),
        formatter(fixed_date_format("isoDate", DATE_PATTERN)),
    );
    types.insert(
        "customDateTimeFormat".to_string(),
        formatter(bound(registry, "formatDate")),
    );
    types.insert(
        "customNumericFormat".to_string(),
        formatter(bound(registry, "formatNumber")),
    );
    types.insert(
        "customVolatilityFormat".to_string(),
        formatter(bound(registry, "formatVolatility")),
    );
    types.insert(
        "customCurrencyFormat".to_string(),
        formatter(bound(registry, "formatCurrency")),
    );
    types.insert(
        "timedeltaFormat".to_string(),
        formatter(bound(registry, "humanizeDuration")),
    );
    types.insert(
        CONDITIONAL_FORMAT_TYPE.to_string(),
        entry([("cellStyle", bound(registry, GRADIENT_CELL_STYLE))]),
    );
    types
}

/// Put `builtins` beneath the host's `columnTypes`, key by key.
///
/// Grid options that are not an object are returned unchanged.
pub fn merge_column_types(
    grid_options: ConfigNode,
    builtins: ConfigMap,
) -> ConfigNode {
    let ConfigNode::Object(mut options) = grid_options else {
        warn!("gridOptions is not an object; built-in column types skipped");
        return grid_options;
    };

    let mut merged = builtins;
    match options.shift_remove(COLUMN_TYPES_KEY) {
        Some(ConfigNode::Object(host_types)) => {
            for (name, definition) in host_types {
                if merged.insert(name.clone(), definition).is_some() {
                    debug!("Host column type {name:?} replaces the built-in one");
                }
            }
        }
        Some(ConfigNode::Null) | None => {}
        Some(other) => {
            warn!("gridOptions.columnTypes is not an object, ignoring it: {:?}", other.to_value());
        }
    }
    options.insert(COLUMN_TYPES_KEY.to_string(), ConfigNode::Object(merged));
    ConfigNode::Object(options)
}

// ─────────────────────────────────────────────────────────────────────────────
// Cell presentation
// ─────────────────────────────────────────────────────────────────────────────

/// What a cell shows: its text and an optional style object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellPresentation {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
}

/// Find the column definition for `field`, searching column groups
pub fn find_column_def<'a>(grid_options: &'a ConfigNode, field: &str) -> Option<&'a ConfigNode> {
    find_in(grid_options.get("columnDefs")?, field)
}

fn find_in<'a>(defs: &'a ConfigNode, field: &str) -> Option<&'a ConfigNode> {
    for def in defs.as_array()? {
        if def.get("field").and_then(ConfigNode::as_str) == Some(field) {
            return Some(def);
        }
        if let Some(found) = def.get("children").and_then(|c| find_in(c, field)) {
            return Some(found);
        }
    }
    None
}

fn type_tags(def: &ConfigNode) -> Vec<&str> {
    match def.get("type") {
        Some(ConfigNode::String(s)) => s.split(',').map(str::trim).collect(),
        Some(ConfigNode::Array(tags)) => tags.iter().filter_map(ConfigNode::as_str).collect(),
        _ => Vec::new(),
    }
}

/// Render one cell the way the grid would.
///
/// Column types apply in tag order, then the column's own `valueFormatter`
/// and `cellStyle` take precedence. Without a formatter the text is the raw
/// value.
pub fn present_cell(grid_options: &ConfigNode, field: &str, row: &Row) -> CellPresentation {
    let value = row.get(field).cloned().unwrap_or(Value::Null);
    let mut presentation = CellPresentation {
        text: format::display_text(&value),
        style: None,
    };
    let Some(def) = find_column_def(grid_options, field) else {
        return presentation;
    };

    let params = json!({
        "value": value,
        "data": Value::Object(row.clone()),
        "colDef": def.to_value(),
    });

    let column_types = grid_options.get(COLUMN_TYPES_KEY);
    let mut value_formatter = None;
    let mut cell_style = None;
    for tag in type_tags(def) {
        let Some(column_type) = column_types.and_then(|types| types.get(tag)) else {
            trace!("Column {field:?} names unknown type {tag:?}");
            continue;
        };
        value_formatter = column_type.get("valueFormatter").or(value_formatter);
        cell_style = column_type.get("cellStyle").or(cell_style);
    }
    value_formatter = def.get("valueFormatter").or(value_formatter);
    cell_style = def.get("cellStyle").or(cell_style);

    if let Some(behavior) = value_formatter.and_then(ConfigNode::as_behavior) {
        presentation.text = format::display_text(&behavior.call(&params));
    }
    presentation.style = match cell_style {
        Some(ConfigNode::Behavior(behavior)) => Some(behavior.call(&params)),
        Some(node @ ConfigNode::Object(_)) => Some(node.to_value()),
        _ => None,
    }
    .filter(|style| !style.is_null());

    presentation
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridsync_core::{GradientPalette, BEHAVIOR_SENTINEL};
    use gridsync_core::BehaviorReconstructor;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    fn options_with(defs: Value, rows: &[Row]) -> ConfigNode {
        let options = json!({ "columnDefs": defs });
        let engine = GradientColorEngine::from_grid(
            &options["columnDefs"],
            rows,
            GradientPalette::default(),
        )
        .unwrap();
        let mut registry = BehaviorRegistry::with_builtins();
        register_gradient_style(&mut registry, Arc::new(engine));
        merge_column_types(ConfigNode::from(options), builtin_column_types(&registry))
    }

    #[test]
    fn test_builtin_table_is_complete() {
        let mut registry = BehaviorRegistry::with_builtins();
        register_gradient_style(&mut registry, Arc::new(GradientColorEngine::default()));
        let types = builtin_column_types(&registry);

        let mut names: Vec<&str> = types.keys().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "conditionalFormat",
                "customCurrencyFormat",
                "customDateFormat",
                "customDateTimeFormat",
                "customNumericFormat",
                "customVolatilityFormat",
                "dateColumnFilter",
                "numberColumnFilter",
                "shortDateTimeFormat",
                "timedeltaFormat",
            ]
        );
        let total: usize = types.values().map(ConfigNode::behavior_count).sum();
        assert_eq!(total, 9);
    }

    #[test]
    fn test_host_column_types_win_per_key() {
        let registry = BehaviorRegistry::with_builtins();
        let options = ConfigNode::from(json!({
            "columnTypes": { "numberColumnFilter": { "filter": "mine" }, "extra": { "width": 10 } }
        }));

        let merged = merge_column_types(options, builtin_column_types(&registry));
        let types = merged.get("columnTypes").unwrap();

        assert_eq!(
            types.get("numberColumnFilter").unwrap().to_value(),
            json!({ "filter": "mine" })
        );
        assert!(types.get("extra").is_some());
        assert!(types.get("customNumericFormat").is_some());
    }

    #[test]
    fn test_present_numeric_and_currency() {
        let options = options_with(
            json!([
                { "field": "n", "type": ["customNumericFormat"], "precision": 1 },
                { "field": "c", "type": "customCurrencyFormat", "custom_currency_symbol": "$" },
                { "field": "raw" }
            ]),
            &[],
        );
        let data = row(json!({ "n": 3.14159, "c": 1234567, "raw": "x" }));

        assert_eq!(present_cell(&options, "n", &data).text, "3.1");
        assert_eq!(present_cell(&options, "c", &data).text, "$1,234,567");
        assert_eq!(present_cell(&options, "raw", &data).text, "x");
        assert_eq!(present_cell(&options, "missing", &data).text, "");
    }

    #[test]
    fn test_present_fixed_date_formats() {
        let options = options_with(
            json!([
                { "field": "short", "type": "shortDateTimeFormat" },
                { "field": "day", "type": "customDateFormat" }
            ]),
            &[],
        );
        let data = row(json!({ "short": "2024-03-09T07:05:00", "day": "2024-03-09T07:05:00" }));

        assert_eq!(present_cell(&options, "short", &data).text, "09/03/2024 07:05");
        assert_eq!(present_cell(&options, "day", &data).text, "2024-03-09");
    }

    #[test]
    fn test_conditional_format_style() {
        let rows = vec![
            row(json!({ "v": 10 })),
            row(json!({ "v": 20 })),
            row(json!({ "v": 30 })),
        ];
        let options = options_with(json!([{ "field": "v", "type": ["conditionalFormat"] }]), &rows);

        let styles: Vec<Value> = rows
            .iter()
            .map(|r| present_cell(&options, "v", r).style.unwrap())
            .collect();
        assert_eq!(
            styles,
            vec![
                json!({ "backgroundColor": "#aa5500" }),
                json!({ "backgroundColor": "#55aa00" }),
                json!({ "backgroundColor": "#00ff00" }),
            ]
        );

        // Values added after construction are not ranked.
        assert_eq!(present_cell(&options, "v", &row(json!({ "v": 99 }))).style, None);
    }

    #[test]
    fn test_column_def_overrides_type() {
        let defs = json!([{
            "field": "n",
            "type": "customNumericFormat",
            "valueFormatter": format!("{BEHAVIOR_SENTINEL} function formatVolatility(p) {{}} {BEHAVIOR_SENTINEL}"),
            "cellStyle": { "color": "red" }
        }]);
        let reconstructor = BehaviorReconstructor::new(BehaviorRegistry::with_builtins(), true);
        let options = merge_column_types(
            reconstructor.reconstruct(json!({ "columnDefs": defs })),
            builtin_column_types(reconstructor.registry()),
        );

        let cell = present_cell(&options, "n", &row(json!({ "n": 0.1234 })));
        assert_eq!(cell.text, "12.3%");
        assert_eq!(cell.style, Some(json!({ "color": "red" })));
    }

    #[test]
    fn test_columns_inside_groups_are_found() {
        let options = options_with(
            json!([{ "headerName": "g", "children": [{ "field": "n", "type": "customNumericFormat" }] }]),
            &[],
        );
        assert_eq!(present_cell(&options, "n", &row(json!({ "n": 2 }))).text, "2.00");
    }
}
