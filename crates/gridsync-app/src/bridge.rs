//! Reconciliation of host property updates with the displayed state

use std::sync::Arc;

use gridsync_core::prelude::*;
use gridsync_core::{ColumnState, GridSnapshot};

use crate::config::HostProps;
use crate::view::GridView;

/// What a property update asks of the next render, read from host flags only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadSignal {
    pub replace_rows: bool,
    pub clear_selection: bool,
}

impl ReloadSignal {
    pub fn from_props(props: &HostProps) -> Self {
        Self {
            replace_rows: props.reload_data,
            clear_selection: props.clear_currently_selected_rows,
        }
    }
}

/// The component's own state between renders
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeState {
    /// Rows currently owned by the component. Replaced, never edited.
    pub snapshot: Arc<GridSnapshot>,
    pub grid_height: u32,
    pub signal: ReloadSignal,
}

impl BridgeState {
    /// State at construction: the initial rows, pushed into the view when it
    /// becomes ready rather than by a render.
    ///
    /// # Errors
    ///
    /// [`Error::RowData`] for missing or malformed `row_data`.
    pub fn initial(props: &HostProps) -> Result<Self> {
        let snapshot = GridSnapshot::from_host(props.row_data.as_deref(), props.frame_dtypes.clone())?;
        Ok(Self {
            snapshot: Arc::new(snapshot),
            grid_height: props.height,
            signal: ReloadSignal {
                replace_rows: false,
                clear_selection: props.clear_currently_selected_rows,
            },
        })
    }

    pub fn should_replace_rows(&self) -> bool {
        self.signal.replace_rows
    }
}

/// Next state for newly supplied properties.
///
/// A reload parses `row_data` into a fresh snapshot; anything else keeps the
/// previous snapshot (the same allocation) and only picks up the height and
/// the selection-clear flag.
///
/// # Errors
///
/// [`Error::RowData`] when a reload carries missing or malformed rows. The
/// previous state is left untouched.
pub fn derive_state(prev: &BridgeState, props: &HostProps) -> Result<BridgeState> {
    let signal = ReloadSignal::from_props(props);

    if signal.replace_rows {
        let snapshot = GridSnapshot::from_host(props.row_data.as_deref(), props.frame_dtypes.clone())?;
        debug!("Reload: {} row(s) replace the current snapshot", snapshot.len());
        return Ok(BridgeState {
            snapshot: Arc::new(snapshot),
            grid_height: props.height,
            signal,
        });
    }

    Ok(BridgeState {
        snapshot: Arc::clone(&prev.snapshot),
        grid_height: props.height,
        signal,
    })
}

/// Push a state into the view.
///
/// Order matters: selection is cleared before anything else, rows are
/// replaced next, and the column state is reapplied last so layout survives
/// the replace.
pub fn render<V: GridView + ?Sized>(
    state: &BridgeState,
    view: &mut V,
    columns_state: Option<&ColumnState>,
) {
    if state.signal.clear_selection {
        view.deselect_all();
    }
    if state.signal.replace_rows {
        view.set_row_data(state.snapshot.rows.clone());
    }
    if let Some(columns_state) = columns_state {
        view.apply_column_state(columns_state, true);
    }
}
