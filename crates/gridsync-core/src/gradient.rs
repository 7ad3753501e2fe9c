//! Conditional formatting: rank values and blend two endpoint colors
//!
//! The [`FormattingDomain`] is computed once from the initial dataset and is
//! never refreshed by live patches, so colors always rank against the data as
//! it was at construction.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::types::Row;

/// Column type tag marking a column for gradient formatting
pub const CONDITIONAL_FORMAT_TYPE: &str = "conditionalFormat";

/// Cell value the host uses for missing numbers; never ranked
pub const NAN_SENTINEL: &str = "nan";

/// Default color of the smallest ranked value
pub const DEFAULT_LOW_COLOR: Rgb = Rgb::new(0xFF, 0x00, 0x00);

/// Default color of the largest ranked value
pub const DEFAULT_HIGH_COLOR: Rgb = Rgb::new(0x00, 0xFF, 0x00);

// ─────────────────────────────────────────────────────────────────────────────
// Rgb
// ─────────────────────────────────────────────────────────────────────────────

/// 24-bit color, parsed from and rendered as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_color(s));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| Error::invalid_color(s))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GradientPalette
// ─────────────────────────────────────────────────────────────────────────────

/// The two endpoint colors of one grid instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradientPalette {
    pub low: Rgb,
    pub high: Rgb,
}

impl Default for GradientPalette {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_COLOR,
            high: DEFAULT_HIGH_COLOR,
        }
    }
}

impl GradientPalette {
    pub fn new(low: Rgb, high: Rgb) -> Self {
        Self { low, high }
    }

    /// Parse both endpoints from `#rrggbb` strings
    pub fn parse(low: &str, high: &str) -> Result<Self> {
        Ok(Self::new(low.parse()?, high.parse()?))
    }

    /// Blend the endpoints: `alpha = 1` is exactly `high`, `alpha = 0` exactly `low`.
    pub fn blend(&self, alpha: f64) -> Rgb {
        Rgb {
            r: blend_channel(self.low.r, self.high.r, alpha),
            g: blend_channel(self.low.g, self.high.g, alpha),
            b: blend_channel(self.low.b, self.high.b, alpha),
        }
    }
}

fn blend_channel(low: u8, high: u8, alpha: f64) -> u8 {
    let mixed = f64::from(high) * alpha + f64::from(low) * (1.0 - alpha);
    mixed.round().clamp(0.0, 255.0) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// FormattingDomain
// ─────────────────────────────────────────────────────────────────────────────

/// Ascending, de-duplicated numeric values of every conditionally formatted cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattingDomain {
    values: Vec<f64>,
}

impl FormattingDomain {
    /// Build the domain from raw cell values.
    ///
    /// The `"nan"` sentinel and anything that is not a finite number (or a
    /// string holding one) is skipped. A numeric string ranks as its number,
    /// so `"10"` and `10` are one entry.
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut ranked: Vec<f64> = values.into_iter().filter_map(rankable).collect();
        ranked.sort_by(f64::total_cmp);
        ranked.dedup_by(|a, b| a == b);
        Self { values: ranked }
    }

    /// Build the domain from the grid's `columnDefs` and the initial rows.
    ///
    /// # Errors
    ///
    /// [`Error::Formatting`] when a flagged column has no `field`.
    pub fn build(column_defs: &Value, rows: &[Row]) -> Result<Self> {
        let fields = conditional_fields(column_defs)?;
        if fields.is_empty() {
            return Ok(Self::default());
        }
        let cells = rows
            .iter()
            .flat_map(|row| fields.iter().filter_map(move |field| row.get(field)));
        Ok(Self::from_values(cells))
    }

    /// Position of `value` in the domain, if it was ranked
    pub fn position(&self, value: &Value) -> Option<usize> {
        let needle = rankable(value)?;
        self.values
            .binary_search_by(|probe| probe.partial_cmp(&needle).unwrap_or(Ordering::Less))
            .ok()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn rankable(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s == NAN_SENTINEL => return None,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

/// Fields of every column whose `type` carries [`CONDITIONAL_FORMAT_TYPE`].
///
/// Column groups are searched through their `children`.
pub fn conditional_fields(column_defs: &Value) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    collect_conditional_fields(column_defs, &mut fields)?;
    Ok(fields)
}

fn collect_conditional_fields(defs: &Value, fields: &mut Vec<String>) -> Result<()> {
    let Some(defs) = defs.as_array() else {
        return Ok(());
    };
    for def in defs {
        if let Some(children) = def.get("children") {
            collect_conditional_fields(children, fields)?;
        }
        if !has_column_type(def, CONDITIONAL_FORMAT_TYPE) {
            continue;
        }
        match def.get("field").and_then(Value::as_str) {
            Some(field) => fields.push(field.to_string()),
            None => {
                return Err(Error::formatting(format!(
                    "column flagged {CONDITIONAL_FORMAT_TYPE} has no field: {def}"
                )))
            }
        }
    }
    Ok(())
}

/// Whether a column definition's `type` tag names `tag`.
///
/// `type` may be a single string or a list of strings.
pub fn has_column_type(def: &Value, tag: &str) -> bool {
    match def.get("type") {
        Some(Value::String(s)) => s.split(',').any(|t| t.trim() == tag),
        Some(Value::Array(tags)) => tags.iter().any(|t| t.as_str() == Some(tag)),
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GradientColorEngine
// ─────────────────────────────────────────────────────────────────────────────

/// Maps ranked values onto a per-instance two-color gradient
#[derive(Debug, Clone, Default)]
pub struct GradientColorEngine {
    domain: FormattingDomain,
    palette: GradientPalette,
}

impl GradientColorEngine {
    pub fn new(domain: FormattingDomain, palette: GradientPalette) -> Self {
        Self { domain, palette }
    }

    /// Build from the grid's column definitions and its initial rows
    pub fn from_grid(column_defs: &Value, rows: &[Row], palette: GradientPalette) -> Result<Self> {
        let domain = FormattingDomain::build(column_defs, rows)?;
        tracing::debug!(
            "Conditional formatting domain: {} distinct value(s)",
            domain.len()
        );
        Ok(Self::new(domain, palette))
    }

    pub fn domain(&self) -> &FormattingDomain {
        &self.domain
    }

    pub fn palette(&self) -> GradientPalette {
        self.palette
    }

    /// Gradient position of `value`: `1/n` for the smallest, `1` for the largest.
    pub fn alpha(&self, value: &Value) -> Option<f64> {
        let index = self.domain.position(value)?;
        Some((index + 1) as f64 / self.domain.len() as f64)
    }

    /// Color for `value`, or `None` when it was not ranked at construction.
    ///
    /// A miss means "no formatting"; the caller leaves the cell unstyled.
    pub fn color_for(&self, value: &Value) -> Option<Rgb> {
        self.alpha(value).map(|alpha| self.palette.blend(alpha))
    }

    /// Cell style object (`{"backgroundColor": "#rrggbb"}`) for `value`
    pub fn cell_style(&self, value: &Value) -> Option<Value> {
        self.color_for(value)
            .map(|color| json!({ "backgroundColor": color.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[Value]) -> Vec<Row> {
        values
            .iter()
            .map(|v| {
                let mut row = Row::new();
                row.insert("v".into(), v.clone());
                row
            })
            .collect()
    }

    fn flagged_v() -> Value {
        json!([{ "field": "v", "type": ["numericColumn", "conditionalFormat"] }])
    }

    #[test]
    fn test_rgb_parse_and_display() {
        let color: Rgb = "#FF8000".parse().unwrap();
        assert_eq!(color, Rgb::new(255, 128, 0));
        assert_eq!(color.to_string(), "#ff8000");
        assert_eq!("00ff00".parse::<Rgb>().unwrap(), DEFAULT_HIGH_COLOR);
    }

    #[test]
    fn test_rgb_parse_rejects_garbage() {
        assert!("#FF00".parse::<Rgb>().is_err());
        assert!("#GG0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_three_value_scenario() {
        let data = rows(&[json!(10), json!(20), json!(30)]);
        let engine =
            GradientColorEngine::from_grid(&flagged_v(), &data, GradientPalette::default()).unwrap();

        let colors: Vec<String> = [10, 20, 30]
            .iter()
            .map(|v| engine.color_for(&json!(v)).unwrap().to_string())
            .collect();
        assert_eq!(colors, vec!["#aa5500", "#55aa00", "#00ff00"]);
    }

    #[test]
    fn test_endpoints_alpha() {
        let data = rows(&[json!(5), json!(1), json!(3), json!(9)]);
        let engine =
            GradientColorEngine::from_grid(&flagged_v(), &data, GradientPalette::default()).unwrap();

        assert_eq!(engine.alpha(&json!(1)), Some(0.25));
        assert_eq!(engine.alpha(&json!(9)), Some(1.0));
        assert_eq!(engine.color_for(&json!(9)), Some(DEFAULT_HIGH_COLOR));
    }

    #[test]
    fn test_domain_excludes_nan_and_dedups() {
        let data = rows(&[json!(3), json!("nan"), json!(1), json!(3), json!(null), json!(2)]);
        let domain = FormattingDomain::build(&flagged_v(), &data).unwrap();
        assert_eq!(domain.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_numeric_strings_share_a_rank_with_numbers() {
        let data = rows(&[json!("10"), json!(10), json!(" 5 "), json!("abc")]);
        let domain = FormattingDomain::build(&flagged_v(), &data).unwrap();
        assert_eq!(domain.values(), &[5.0, 10.0]);
        assert_eq!(domain.position(&json!("10")), domain.position(&json!(10)));
    }

    #[test]
    fn test_domain_build_is_idempotent() {
        let data = rows(&[json!(7), json!(2), json!(7), json!(4)]);
        let first = FormattingDomain::build(&flagged_v(), &data).unwrap();
        let second = FormattingDomain::build(&flagged_v(), &data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_domain_spans_all_flagged_columns() {
        let defs = json!([
            { "field": "a", "type": "conditionalFormat" },
            { "field": "b" },
            { "headerName": "group", "children": [{ "field": "c", "type": ["conditionalFormat"] }] }
        ]);
        let mut row = Row::new();
        row.insert("a".into(), json!(1));
        row.insert("b".into(), json!(100));
        row.insert("c".into(), json!(2));
        let domain = FormattingDomain::build(&defs, &[row]).unwrap();
        assert_eq!(domain.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_flagged_column_without_field_is_fatal() {
        let defs = json!([{ "type": "conditionalFormat" }]);
        let err = FormattingDomain::build(&defs, &[]).unwrap_err();
        assert!(matches!(err, Error::Formatting { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_lookup_miss_applies_no_formatting() {
        let data = rows(&[json!(10), json!(20)]);
        let engine =
            GradientColorEngine::from_grid(&flagged_v(), &data, GradientPalette::default()).unwrap();
        assert_eq!(engine.color_for(&json!(15)), None);
        assert_eq!(engine.cell_style(&json!("nan")), None);
    }

    #[test]
    fn test_custom_palette_per_instance() {
        let palette = GradientPalette::parse("#000000", "#0000FF").unwrap();
        let data = rows(&[json!(1), json!(2)]);
        let engine = GradientColorEngine::from_grid(&flagged_v(), &data, palette).unwrap();
        assert_eq!(engine.color_for(&json!(2)).unwrap().to_string(), "#0000ff");
        assert_eq!(engine.color_for(&json!(1)).unwrap().to_string(), "#000080");
        assert_eq!(
            engine.cell_style(&json!(2)),
            Some(json!({ "backgroundColor": "#0000ff" }))
        );
    }
}
