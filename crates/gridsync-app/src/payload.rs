//! Assembly of the value returned to the host

use serde_json::Value;

use gridsync_core::{selected_item, DataReturnMode, ReturnPayload, Row};

use crate::view::{RowModel, RowNode};

/// Builds a [`ReturnPayload`] from the view as it is right now
#[derive(Debug, Clone)]
pub struct ReturnValueBuilder {
    mode: DataReturnMode,
    original_dtypes: Value,
}

impl ReturnValueBuilder {
    pub fn new(mode: DataReturnMode, original_dtypes: Value) -> Self {
        Self {
            mode,
            original_dtypes,
        }
    }

    pub fn mode(&self) -> DataReturnMode {
        self.mode
    }

    /// Read rows, selection and column state in one pass.
    ///
    /// Group rows never appear in the filtered modes; selection and column
    /// state ignore the mode.
    pub fn build(&self, view: &dyn RowModel) -> ReturnPayload {
        let mut row_data = Vec::new();
        match self.mode {
            DataReturnMode::All => view.for_each_leaf_node(&mut |node| push_data(&mut row_data, node)),
            DataReturnMode::Filtered => view.for_each_node_after_filter(&mut |node| {
                if !node.group {
                    push_data(&mut row_data, node);
                }
            }),
            DataReturnMode::FilteredSorted => {
                view.for_each_node_after_filter_and_sort(&mut |node| {
                    if !node.group {
                        push_data(&mut row_data, node);
                    }
                })
            }
        }

        let selected = view.selected_nodes();
        let selected_items: Vec<Row> = selected
            .iter()
            .filter_map(|node| node.data.as_ref().map(|data| selected_item(node.row_index, data)))
            .collect();

        ReturnPayload {
            original_dtypes: self.original_dtypes.clone(),
            row_data,
            selected_rows: view.selected_rows(),
            selected_items,
            col_state: view.column_state(),
        }
    }
}

fn push_data(rows: &mut Vec<Row>, node: &RowNode) {
    if let Some(data) = &node.data {
        rows.push(data.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{FilterCondition, GridView, InMemoryGrid};
    use gridsync_core::{ConfigNode, SortDirection};
    use serde_json::json;

    fn grid() -> InMemoryGrid {
        let mut grid = InMemoryGrid::new();
        grid.set_grid_options(ConfigNode::from(json!({
            "columnDefs": [{ "field": "k", "rowGroup": true }, { "field": "v" }]
        })));
        grid.set_row_data(
            serde_json::from_value(json!([
                { "k": "a", "v": 3 },
                { "k": "b", "v": 1 },
                { "k": "a", "v": 2 },
                { "k": "b", "v": 5 }
            ]))
            .unwrap(),
        );
        grid.set_filter("v", FilterCondition::LessThan(4.0));
        grid.sort_by("v", Some(SortDirection::Asc));
        grid
    }

    fn values(payload: &ReturnPayload) -> Vec<i64> {
        payload
            .row_data
            .iter()
            .map(|r| r["v"].as_i64().unwrap())
            .collect()
    }

    #[test]
    fn test_all_mode_ignores_filters_and_sort() {
        let payload = ReturnValueBuilder::new(DataReturnMode::All, Value::Null).build(&grid());
        assert_eq!(values(&payload), vec![3, 1, 2, 5]);
    }

    #[test]
    fn test_filtered_mode_keeps_store_order_with_groups() {
        let payload = ReturnValueBuilder::new(DataReturnMode::Filtered, Value::Null).build(&grid());
        assert_eq!(values(&payload), vec![3, 1, 2]);
    }

    #[test]
    fn test_filtered_sorted_mode_uses_display_order() {
        let payload =
            ReturnValueBuilder::new(DataReturnMode::FilteredSorted, Value::Null).build(&grid());
        // Groups follow the sorted rows: b (1) first, then a (2, 3).
        assert_eq!(values(&payload), vec![1, 2, 3]);
    }

    #[test]
    fn test_row_counts_are_ordered() {
        let view = grid();
        let all = ReturnValueBuilder::new(DataReturnMode::All, Value::Null).build(&view);
        let filtered = ReturnValueBuilder::new(DataReturnMode::Filtered, Value::Null).build(&view);
        let sorted =
            ReturnValueBuilder::new(DataReturnMode::FilteredSorted, Value::Null).build(&view);

        assert!(all.row_data.len() >= filtered.row_data.len());
        let mut a = values(&filtered);
        let mut b = values(&sorted);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_selection_and_metadata() {
        let mut view = grid();
        view.select_index(1);
        let dtypes = json!({ "k": "object", "v": "int64" });

        let payload = ReturnValueBuilder::new(DataReturnMode::All, dtypes.clone()).build(&view);

        assert_eq!(payload.original_dtypes, dtypes);
        assert_eq!(payload.selected_rows, vec![view.displayed_rows()[0].clone()]);
        assert_eq!(payload.selected_items[0]["rowIndex"], json!(1));
        assert_eq!(payload.selected_items[0]["v"], json!(1));
        assert_eq!(payload.col_state, view.column_state());
    }

    #[test]
    fn test_empty_view_gives_empty_collections() {
        let payload = ReturnValueBuilder::new(DataReturnMode::FilteredSorted, Value::Null)
            .build(&InMemoryGrid::new());
        assert!(payload.row_data.is_empty());
        assert!(payload.selected_rows.is_empty());
        assert!(payload.selected_items.is_empty());
        assert!(payload.col_state.is_empty());
    }
}
