//! The grid view as seen by the component
//!
//! The grid widget is an external collaborator. The component only needs to
//! read rows, selection and column layout back ([`RowModel`]), subscribe to
//! named events on it and its child views ([`EventSource`]), and push data and
//! layout into it ([`GridView`]).

pub mod memory;

use gridsync_core::{ColumnState, ConfigNode, Row, RowTransaction, TransactionResult};

pub use memory::{ColumnFit, FilterCondition, InMemoryGrid};

/// Position of a view in the view tree: child indices from the top-level view.
///
/// The top-level view has the empty path.
pub type ViewPath = Vec<usize>;

/// One node as the view reports it
#[derive(Debug, Clone, PartialEq)]
pub struct RowNode {
    pub id: String,
    /// Position in the current display order, `None` when filtered out
    pub row_index: Option<usize>,
    /// `None` for synthetic group rows
    pub data: Option<Row>,
    pub group: bool,
    pub selected: bool,
}

/// A named event raised by a view
#[derive(Debug, Clone, PartialEq)]
pub struct GridEvent {
    pub event_type: String,
}

impl GridEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }
}

/// Callback registered on a view. Must not block.
pub type EventListener = Box<dyn FnMut(&GridEvent) + Send>;

/// Read access to rows, selection and column layout
pub trait RowModel {
    /// Every leaf row in store order, ignoring filters, sorts and grouping.
    fn for_each_leaf_node(&self, f: &mut dyn FnMut(&RowNode));

    /// Nodes passing the active filters in store order, group rows included.
    fn for_each_node_after_filter(&self, f: &mut dyn FnMut(&RowNode));

    /// Nodes passing the active filters in display order, group rows included.
    fn for_each_node_after_filter_and_sort(&self, f: &mut dyn FnMut(&RowNode));

    fn selected_nodes(&self) -> Vec<RowNode>;

    fn selected_rows(&self) -> Vec<Row> {
        self.selected_nodes()
            .into_iter()
            .filter_map(|node| node.data)
            .collect()
    }

    fn column_state(&self) -> ColumnState;
}

/// Event subscription on a view and, through it, on its child views
pub trait EventSource {
    fn add_event_listener(&mut self, event: &str, listener: EventListener);

    /// Visit nested views (for example master/detail sub-grids) in a stable order.
    fn for_each_child(&mut self, f: &mut dyn FnMut(&mut dyn EventSource));
}

/// Everything the component drives on the top-level view
pub trait GridView: RowModel + EventSource + Send {
    fn set_grid_options(&mut self, options: ConfigNode);

    fn set_row_data(&mut self, rows: Vec<Row>);

    fn deselect_all(&mut self);

    /// Select the node at display position `index`, keeping other selections.
    fn select_index(&mut self, index: usize);

    fn apply_column_state(&mut self, state: &ColumnState, apply_order: bool);

    /// Field that identifies a row for transaction updates
    fn set_row_id_field(&mut self, field: Option<String>);

    fn apply_transaction(&mut self, transaction: RowTransaction) -> TransactionResult;

    fn size_columns_to_fit(&mut self);

    fn auto_size_all_columns(&mut self);

    /// Hand the enterprise license to the view. Views without licensed
    /// features ignore it.
    fn enable_enterprise_modules(&mut self, _license_key: Option<&str>) {}
}
