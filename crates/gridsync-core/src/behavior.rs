//! Reconstruction of host-authored behavior from configuration text
//!
//! Hosts mark a configuration string as behavior by wrapping a function- or
//! class-shaped fragment in [`BEHAVIOR_SENTINEL`]:
//!
//! ```text
//! --x_x--0_0-- function formatCurrency(params) { ... } --x_x--0_0--
//! ```
//!
//! Source text is never executed. The identifier after `function` / `class`
//! selects a behavior from a closed [`BehaviorRegistry`]; the whole mechanism
//! only runs when the host opted in with `allow_unsafe_jscode`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use indexmap::IndexMap;
use regex::Regex;
use serde_json::{json, Number, Value};

use crate::format;

/// Delimiter wrapping behavior source in configuration strings
pub const BEHAVIOR_SENTINEL: &str = "--x_x--0_0--";

static BEHAVIOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let sentinel = regex::escape(BEHAVIOR_SENTINEL);
    Regex::new(&format!(r"(?s){sentinel}\s*((function|class)\s*.*?)\s*{sentinel}"))
        .expect("Invalid behavior sentinel regex")
});

static BEHAVIOR_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:function|class)\s*\*?\s*([A-Za-z_$][\w$]*)")
        .expect("Invalid behavior name regex")
});

// ─────────────────────────────────────────────────────────────────────────────
// Behavior
// ─────────────────────────────────────────────────────────────────────────────

/// A callable bound into the grid configuration (formatter, style, comparator).
///
/// Arguments and results are JSON, mirroring the params object a grid passes
/// to its callbacks (`{"value": .., "colDef": {..}, "data": {..}}`).
pub trait Behavior: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn call(&self, params: &Value) -> Value;
}

/// [`Behavior`] backed by a closure
pub struct FnBehavior<F> {
    name: String,
    f: F,
}

impl<F> FnBehavior<F>
where
    F: Fn(&Value) -> Value + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for FnBehavior<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBehavior").field("name", &self.name).finish()
    }
}

impl<F> Behavior for FnBehavior<F>
where
    F: Fn(&Value) -> Value + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, params: &Value) -> Value {
        (self.f)(params)
    }
}

/// A behavior bound at a configuration leaf, with the text it replaced
#[derive(Clone)]
pub struct BoundBehavior {
    pub behavior: Arc<dyn Behavior>,
    pub source: String,
}

impl BoundBehavior {
    pub fn call(&self, params: &Value) -> Value {
        self.behavior.call(params)
    }
}

impl fmt::Debug for BoundBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundBehavior")
            .field("name", &self.behavior.name())
            .finish()
    }
}

impl PartialEq for BoundBehavior {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.behavior, &other.behavior) && self.source == other.source
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConfigNode
// ─────────────────────────────────────────────────────────────────────────────

/// Object members of a [`ConfigNode`], in the order the host wrote them
pub type ConfigMap = IndexMap<String, ConfigNode>;

/// A configuration tree whose leaves may be live behavior
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ConfigNode>),
    Object(ConfigMap),
    Behavior(BoundBehavior),
}

impl From<Value> for ConfigNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl ConfigNode {
    /// Child of an object node
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        match self {
            Self::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigNode]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_behavior(&self) -> Option<&BoundBehavior> {
        match self {
            Self::Behavior(b) => Some(b),
            _ => None,
        }
    }

    /// Convert back to plain JSON; behavior leaves render as their source text.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            Self::Behavior(b) => Value::String(b.source.clone()),
        }
    }

    /// Number of behavior leaves in the tree
    pub fn behavior_count(&self) -> usize {
        match self {
            Self::Behavior(_) => 1,
            Self::Array(items) => items.iter().map(Self::behavior_count).sum(),
            Self::Object(map) => map.values().map(Self::behavior_count).sum(),
            _ => 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorRegistry
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of behaviors a configuration may name
#[derive(Debug, Clone, Default)]
pub struct BehaviorRegistry {
    behaviors: HashMap<String, Arc<dyn Behavior>>,
}

impl BehaviorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the formatter behaviors
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(FnBehavior::new("formatNumber", |p| {
            Value::String(format::format_number(param_value(p), col_precision(p, 2)))
        }));
        registry.register(FnBehavior::new("formatCurrency", |p| {
            let symbol = col_def_str(p, "custom_currency_symbol").unwrap_or_default();
            Value::String(format::format_currency(
                param_value(p),
                symbol,
                col_precision(p, 0),
            ))
        }));
        registry.register(FnBehavior::new("formatVolatility", |p| {
            Value::String(format::format_volatility(param_value(p), col_precision(p, 1)))
        }));
        registry.register(FnBehavior::new("formatDate", |p| {
            let pattern = col_def_str(p, "custom_format_string").unwrap_or(format::DATE_PATTERN);
            Value::String(format::format_date(param_value(p), pattern))
        }));
        registry.register(FnBehavior::new("humanizeDuration", |p| {
            Value::String(format::humanize_duration(param_value(p)))
        }));
        registry.register(FnBehavior::new("compareIsoDates", |p| {
            let cell = p.get("cellValue").and_then(Value::as_str);
            let filter = p.get("filterValue").and_then(Value::as_str);
            match cell.zip(filter).and_then(|(c, f)| format::compare_iso_dates(c, f)) {
                Some(ordering) => json!(ordering as i8),
                None => Value::Null,
            }
        }));
        registry
    }

    pub fn register<B: Behavior + 'static>(&mut self, behavior: B) {
        self.register_shared(Arc::new(behavior));
    }

    pub fn register_shared(&mut self, behavior: Arc<dyn Behavior>) {
        self.behaviors
            .insert(behavior.name().to_string(), behavior);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Behavior>> {
        self.behaviors.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.behaviors.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.behaviors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn param_value(params: &Value) -> &Value {
    params.get("value").unwrap_or(&Value::Null)
}

fn col_def_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get("colDef")?.get(key)?.as_str()
}

fn col_precision(params: &Value, default: usize) -> usize {
    params
        .get("colDef")
        .and_then(|c| c.get("precision"))
        .and_then(Value::as_u64)
        .map(|p| p as usize)
        .unwrap_or(default)
}

// ─────────────────────────────────────────────────────────────────────────────
// BehaviorReconstructor
// ─────────────────────────────────────────────────────────────────────────────

/// Behavior source fragment found in a sentinel-wrapped string
pub fn extract_fragment(text: &str) -> Option<&str> {
    BEHAVIOR_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Name declared by a `function name` / `class Name` fragment
pub fn fragment_name(fragment: &str) -> Option<&str> {
    BEHAVIOR_NAME
        .captures(fragment.trim_start())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Walks a configuration tree and binds sentinel-wrapped leaves to behaviors
#[derive(Debug, Clone)]
pub struct BehaviorReconstructor {
    registry: BehaviorRegistry,
    allow_unsafe: bool,
}

impl BehaviorReconstructor {
    pub fn new(registry: BehaviorRegistry, allow_unsafe: bool) -> Self {
        Self {
            registry,
            allow_unsafe,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.allow_unsafe
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    /// Return an equivalent tree with behavior leaves bound.
    ///
    /// With the opt-in flag off the tree is converted verbatim and sentinel
    /// strings stay plain data.
    pub fn reconstruct(&self, config: Value) -> ConfigNode {
        if !self.allow_unsafe {
            return ConfigNode::from(config);
        }
        tracing::warn!("allow_unsafe_jscode is on: binding behavior named in grid options");
        let node = self.map_value(config);
        tracing::debug!("Bound {} behavior leaf(s)", node.behavior_count());
        node
    }

    fn map_value(&self, value: Value) -> ConfigNode {
        match value {
            Value::String(s) => self.map_leaf(s),
            Value::Array(items) => {
                ConfigNode::Array(items.into_iter().map(|v| self.map_value(v)).collect())
            }
            Value::Object(map) => ConfigNode::Object(
                map.into_iter()
                    .map(|(k, v)| (k, self.map_value(v)))
                    .collect(),
            ),
            other => ConfigNode::from(other),
        }
    }

    fn map_leaf(&self, text: String) -> ConfigNode {
        let Some(fragment) = extract_fragment(&text) else {
            return ConfigNode::String(text);
        };
        let Some(name) = fragment_name(fragment) else {
            tracing::warn!("Behavior fragment has no name, keeping it as text: {fragment}");
            return ConfigNode::String(text);
        };
        match self.registry.get(name) {
            Some(behavior) => ConfigNode::Behavior(BoundBehavior {
                behavior,
                source: fragment.to_string(),
            }),
            None => {
                tracing::warn!("Unknown behavior {name:?}, keeping it as text");
                ConfigNode::String(text)
            }
        }
    }
}
