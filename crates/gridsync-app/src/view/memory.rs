//! In-memory grid view
//!
//! A complete [`GridView`] over a plain row store: filter conditions, column
//! state driven sorting, single-level row grouping, selection, transactions
//! and detail grids. Used by the headless runner and throughout the tests.
//!
//! Programmatic calls through [`GridView`] never raise events, with the one
//! exception of `firstDataRendered`. The interaction methods ([`select_row`],
//! [`sort_by`], [`set_filter`], [`edit_cell`], ...) raise the events a user
//! would cause.
//!
//! [`select_row`]: InMemoryGrid::select_row
//! [`sort_by`]: InMemoryGrid::sort_by
//! [`set_filter`]: InMemoryGrid::set_filter
//! [`edit_cell`]: InMemoryGrid::edit_cell

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde_json::Value;

use gridsync_core::format::{display_text, parse_number};
use gridsync_core::prelude::*;
use gridsync_core::{
    ColumnState, ColumnStateEntry, ConfigNode, Row, RowTransaction, SortDirection,
    TransactionResult,
};

use super::{EventListener, EventSource, GridEvent, GridView, RowModel, RowNode};

pub const SELECTION_CHANGED: &str = "selectionChanged";
pub const SORT_CHANGED: &str = "sortChanged";
pub const FILTER_CHANGED: &str = "filterChanged";
pub const CELL_VALUE_CHANGED: &str = "cellValueChanged";
pub const FIRST_DATA_RENDERED: &str = "firstDataRendered";

// ─────────────────────────────────────────────────────────────────────────────
// Filters
// ─────────────────────────────────────────────────────────────────────────────

/// A per-column filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    Equals(Value),
    /// Case-insensitive substring of the displayed value
    Contains(String),
    GreaterThan(f64),
    LessThan(f64),
}

impl FilterCondition {
    /// Parse filter text: `>n`, `<n`, `=value`, anything else is a substring.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(n) = text.strip_prefix('>').and_then(|s| s.trim().parse().ok()) {
            return Self::GreaterThan(n);
        }
        if let Some(n) = text.strip_prefix('<').and_then(|s| s.trim().parse().ok()) {
            return Self::LessThan(n);
        }
        if let Some(rest) = text.strip_prefix('=') {
            let rest = rest.trim();
            let value = serde_json::from_str(rest).unwrap_or_else(|_| Value::from(rest));
            return Self::Equals(value);
        }
        Self::Contains(text.to_lowercase())
    }

    pub fn matches(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::Equals(expected) => {
                value == expected || display_text(value) == display_text(expected)
            }
            Self::Contains(needle) => display_text(value).to_lowercase().contains(needle),
            Self::GreaterThan(n) => parse_number(value).is_some_and(|v| v > *n),
            Self::LessThan(n) => parse_number(value).is_some_and(|v| v < *n),
        }
    }
}

/// Which column sizing call the view last received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFit {
    SizedToFit,
    AutoSized,
}

// ─────────────────────────────────────────────────────────────────────────────
// InMemoryGrid
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StoredRow {
    id: String,
    data: Row,
    selected: bool,
}

#[derive(Default)]
pub struct InMemoryGrid {
    rows: Vec<StoredRow>,
    row_id_field: Option<String>,
    next_seq: u64,
    columns: Vec<ColumnStateEntry>,
    group_field: Option<String>,
    filters: BTreeMap<String, FilterCondition>,
    listeners: HashMap<String, Vec<EventListener>>,
    children: Vec<InMemoryGrid>,
    grid_options: Option<ConfigNode>,
    first_data_rendered: bool,
    column_fit: Option<ColumnFit>,
    enterprise_license: Option<Option<String>>,
}

impl fmt::Debug for InMemoryGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryGrid")
            .field("rows", &self.rows.len())
            .field("columns", &self.columns.len())
            .field("filters", &self.filters)
            .field("children", &self.children.len())
            .finish()
    }
}

impl InMemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// A grid already holding `rows`, as a detail grid would.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let mut grid = Self::new();
        grid.set_row_data(rows);
        grid
    }

    // ── Inspection ───────────────────────────────────────────────────────

    /// Rows in store order
    pub fn row_data(&self) -> Vec<Row> {
        self.rows.iter().map(|r| r.data.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Row with identity `id`
    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id).map(|r| &r.data)
    }

    /// Leaf rows in display order
    pub fn displayed_rows(&self) -> Vec<Row> {
        self.layout().into_iter().filter_map(|n| n.data).collect()
    }

    pub fn grid_options(&self) -> Option<&ConfigNode> {
        self.grid_options.as_ref()
    }

    pub fn column_fit(&self) -> Option<ColumnFit> {
        self.column_fit
    }

    /// `Some(key)` once enterprise modules were enabled
    pub fn enterprise_license(&self) -> Option<Option<&str>> {
        self.enterprise_license.as_ref().map(|k| k.as_deref())
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    // ── Detail grids ─────────────────────────────────────────────────────

    pub fn add_detail_grid(&mut self, grid: InMemoryGrid) {
        self.children.push(grid);
    }

    pub fn detail_grid(&self, index: usize) -> Option<&InMemoryGrid> {
        self.children.get(index)
    }

    pub fn detail_grid_mut(&mut self, index: usize) -> Option<&mut InMemoryGrid> {
        self.children.get_mut(index)
    }

    // ── User interaction ─────────────────────────────────────────────────

    /// Select the row at display position `index`, as a click would.
    pub fn select_row(&mut self, index: usize) -> Result<()> {
        let id = self.leaf_id_at(index)?;
        for row in &mut self.rows {
            row.selected = row.id == id;
        }
        self.fire(SELECTION_CHANGED);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.deselect_all();
        self.fire(SELECTION_CHANGED);
    }

    /// Sort by a single column, clearing any other sort.
    pub fn sort_by(&mut self, field: &str, direction: Option<SortDirection>) {
        for column in &mut self.columns {
            column.attributes.insert("sort".into(), Value::Null);
            column.attributes.insert("sortIndex".into(), Value::Null);
        }
        if let Some(direction) = direction {
            let column = self.column_mut(field);
            column
                .attributes
                .insert("sort".into(), Value::from(sort_name(direction)));
            column.attributes.insert("sortIndex".into(), Value::from(0));
        }
        self.fire(SORT_CHANGED);
    }

    pub fn set_filter(&mut self, field: &str, condition: FilterCondition) {
        self.filters.insert(field.to_string(), condition);
        self.fire(FILTER_CHANGED);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.fire(FILTER_CHANGED);
    }

    /// Change one cell of the row at display position `index`.
    pub fn edit_cell(&mut self, index: usize, field: &str, value: Value) -> Result<()> {
        let id = self.leaf_id_at(index)?;
        if let Some(row) = self.rows.iter_mut().find(|r| r.id == id) {
            row.data.insert(field.to_string(), value);
        }
        self.fire(CELL_VALUE_CHANGED);
        Ok(())
    }

    /// Raise an arbitrary named event.
    pub fn raise(&mut self, event: &str) {
        self.fire(event);
    }

    fn fire(&mut self, event: &str) {
        let Some(listeners) = self.listeners.get_mut(event) else {
            trace!("No listeners for {}", event);
            return;
        };
        let grid_event = GridEvent::new(event);
        for listener in listeners.iter_mut() {
            listener(&grid_event);
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn leaf_id_at(&self, index: usize) -> Result<String> {
        self.layout()
            .into_iter()
            .find(|n| n.row_index == Some(index) && !n.group)
            .map(|n| n.id)
            .ok_or_else(|| Error::view(format!("no row at display index {index}")))
    }

    fn column_mut(&mut self, col_id: &str) -> &mut ColumnStateEntry {
        let pos = match self.columns.iter().position(|c| c.col_id == col_id) {
            Some(pos) => pos,
            None => {
                self.columns.push(ColumnStateEntry::new(col_id));
                self.columns.len() - 1
            }
        };
        &mut self.columns[pos]
    }

    fn identify(&mut self, data: &Row) -> String {
        if let Some(value) = self.row_id_field.as_ref().and_then(|f| data.get(f)) {
            return display_text(value);
        }
        let id = self.next_seq.to_string();
        self.next_seq += 1;
        id
    }

    fn passes_filters(&self, data: &Row) -> bool {
        self.filters
            .iter()
            .all(|(field, condition)| condition.matches(data.get(field)))
    }

    fn sort_keys(&self) -> Vec<(String, SortDirection)> {
        let mut keyed: Vec<(u64, usize, String, SortDirection)> = self
            .columns
            .iter()
            .enumerate()
            .filter_map(|(pos, c)| {
                c.sort()
                    .map(|dir| (c.sort_index().unwrap_or(u64::MAX), pos, c.col_id.clone(), dir))
            })
            .collect();
        keyed.sort_by_key(|(index, pos, _, _)| (*index, *pos));
        keyed
            .into_iter()
            .map(|(_, _, field, dir)| (field, dir))
            .collect()
    }

    fn leaf_node(row: &StoredRow) -> RowNode {
        RowNode {
            id: row.id.clone(),
            row_index: None,
            data: Some(row.data.clone()),
            group: false,
            selected: row.selected,
        }
    }

    /// Filtered and sorted nodes with group rows, indexed by their position
    /// in this listing.
    fn layout(&self) -> Vec<RowNode> {
        let mut rows: Vec<&StoredRow> = self
            .rows
            .iter()
            .filter(|r| self.passes_filters(&r.data))
            .collect();

        let keys = self.sort_keys();
        if !keys.is_empty() {
            rows.sort_by(|a, b| compare_rows(&a.data, &b.data, &keys));
        }

        let mut nodes = Vec::with_capacity(rows.len());
        match &self.group_field {
            None => nodes.extend(rows.into_iter().map(Self::leaf_node)),
            Some(field) => {
                let mut groups: Vec<(String, Vec<&StoredRow>)> = Vec::new();
                for row in rows {
                    let key = row.data.get(field).map(display_text).unwrap_or_default();
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, members)) => members.push(row),
                        None => groups.push((key, vec![row])),
                    }
                }
                for (key, members) in groups {
                    nodes.push(RowNode {
                        id: format!("row-group-{field}-{key}"),
                        row_index: None,
                        data: None,
                        group: true,
                        selected: false,
                    });
                    nodes.extend(members.into_iter().map(Self::leaf_node));
                }
            }
        }

        for (index, node) in nodes.iter_mut().enumerate() {
            node.row_index = Some(index);
        }
        nodes
    }

    /// Node id → position in the current display order
    fn display_indices(&self) -> HashMap<String, usize> {
        self.layout()
            .into_iter()
            .filter_map(|n| n.row_index.map(|i| (n.id, i)))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait impls
// ─────────────────────────────────────────────────────────────────────────────

impl RowModel for InMemoryGrid {
    fn for_each_leaf_node(&self, f: &mut dyn FnMut(&RowNode)) {
        let indices = self.display_indices();
        for row in &self.rows {
            let mut node = Self::leaf_node(row);
            node.row_index = indices.get(&row.id).copied();
            f(&node);
        }
    }

    fn for_each_node_after_filter(&self, f: &mut dyn FnMut(&RowNode)) {
        let indices = self.display_indices();
        // Store order, so grouping never reorders leaves here.
        for row in self.rows.iter().filter(|r| self.passes_filters(&r.data)) {
            let mut node = Self::leaf_node(row);
            node.row_index = indices.get(&row.id).copied();
            f(&node);
        }
    }

    fn for_each_node_after_filter_and_sort(&self, f: &mut dyn FnMut(&RowNode)) {
        for node in self.layout() {
            f(&node);
        }
    }

    fn selected_nodes(&self) -> Vec<RowNode> {
        let indices = self.display_indices();
        self.rows
            .iter()
            .filter(|r| r.selected)
            .map(|r| {
                let mut node = Self::leaf_node(r);
                node.row_index = indices.get(&r.id).copied();
                node
            })
            .collect()
    }

    fn column_state(&self) -> ColumnState {
        ColumnState(self.columns.clone())
    }
}

impl EventSource for InMemoryGrid {
    fn add_event_listener(&mut self, event: &str, listener: EventListener) {
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn for_each_child(&mut self, f: &mut dyn FnMut(&mut dyn EventSource)) {
        for child in &mut self.children {
            f(child);
        }
    }
}

impl GridView for InMemoryGrid {
    fn set_grid_options(&mut self, options: ConfigNode) {
        let mut fields = Vec::new();
        let mut group_field = None;
        if let Some(defs) = options.get("columnDefs") {
            collect_columns(defs, &mut fields, &mut group_field);
        }
        for field in fields {
            self.column_mut(&field);
        }
        self.group_field = group_field;
        self.grid_options = Some(options);
    }

    fn set_row_data(&mut self, rows: Vec<Row>) {
        if self.columns.is_empty() {
            if let Some(first) = rows.first() {
                self.columns = first.keys().map(ColumnStateEntry::new).collect();
            }
        }

        self.next_seq = 0;
        let mut stored = Vec::with_capacity(rows.len());
        for data in rows {
            let id = self.identify(&data);
            stored.push(StoredRow {
                id,
                data,
                selected: false,
            });
        }
        self.rows = stored;

        if !self.first_data_rendered && !self.rows.is_empty() {
            self.first_data_rendered = true;
            self.fire(FIRST_DATA_RENDERED);
        }
    }

    fn deselect_all(&mut self) {
        for row in &mut self.rows {
            row.selected = false;
        }
    }

    fn select_index(&mut self, index: usize) {
        match self.leaf_id_at(index) {
            Ok(id) => {
                if let Some(row) = self.rows.iter_mut().find(|r| r.id == id) {
                    row.selected = true;
                }
            }
            Err(e) => debug!("select_index ignored: {}", e),
        }
    }

    fn apply_column_state(&mut self, state: &ColumnState, apply_order: bool) {
        for entry in state.entries() {
            let column = self.column_mut(&entry.col_id);
            for (key, value) in &entry.attributes {
                column.attributes.insert(key.clone(), value.clone());
            }
        }

        if apply_order {
            let mut ordered = Vec::with_capacity(self.columns.len());
            for entry in state.entries() {
                if let Some(pos) = self.columns.iter().position(|c| c.col_id == entry.col_id) {
                    ordered.push(self.columns.remove(pos));
                }
            }
            ordered.append(&mut self.columns);
            self.columns = ordered;
        }
    }

    fn set_row_id_field(&mut self, field: Option<String>) {
        self.row_id_field = field;
        self.next_seq = 0;
        let mut rows = std::mem::take(&mut self.rows);
        for row in &mut rows {
            row.id = self.identify(&row.data);
        }
        self.rows = rows;
    }

    fn apply_transaction(&mut self, transaction: RowTransaction) -> TransactionResult {
        let mut result = TransactionResult::default();

        for data in transaction.add {
            let id = self.identify(&data);
            self.rows.push(StoredRow {
                id,
                data,
                selected: false,
            });
            result.added += 1;
        }

        for patch in transaction.update {
            let target = self.patch_target(&patch);
            match target.and_then(|id| self.rows.iter_mut().find(|r| r.id == id)) {
                Some(row) => {
                    for (key, value) in patch {
                        row.data.insert(key, value);
                    }
                    result.updated += 1;
                }
                None => {
                    let patch = Value::Object(patch);
                    warn!("Row patch matched no row: {}", patch);
                    result.unmatched += 1;
                }
            }
        }

        for patch in transaction.remove {
            let target = self.patch_target(&patch);
            match target.and_then(|id| self.rows.iter().position(|r| r.id == id)) {
                Some(pos) => {
                    self.rows.remove(pos);
                    result.removed += 1;
                }
                None => {
                    let patch = Value::Object(patch);
                    warn!("Row removal matched no row: {}", patch);
                    result.unmatched += 1;
                }
            }
        }

        result
    }

    fn size_columns_to_fit(&mut self) {
        self.column_fit = Some(ColumnFit::SizedToFit);
    }

    fn auto_size_all_columns(&mut self) {
        self.column_fit = Some(ColumnFit::AutoSized);
    }

    fn enable_enterprise_modules(&mut self, license_key: Option<&str>) {
        self.enterprise_license = Some(license_key.map(str::to_string));
    }
}

impl InMemoryGrid {
    fn patch_target(&self, patch: &Row) -> Option<String> {
        let field = self.row_id_field.as_ref()?;
        patch.get(field).map(display_text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn collect_columns(defs: &ConfigNode, fields: &mut Vec<String>, group: &mut Option<String>) {
    let Some(defs) = defs.as_array() else {
        return;
    };
    for def in defs {
        if let Some(children) = def.get("children") {
            collect_columns(children, fields, group);
        }
        let Some(field) = def.get("field").and_then(ConfigNode::as_str) else {
            continue;
        };
        if group.is_none() && def.get("rowGroup") == Some(&ConfigNode::Bool(true)) {
            *group = Some(field.to_string());
        }
        fields.push(field.to_string());
    }
}

fn sort_name(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    }
}

fn compare_rows(a: &Row, b: &Row, keys: &[(String, SortDirection)]) -> Ordering {
    for (field, direction) in keys {
        let ordering = compare_values(a.get(field), b.get(field));
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
