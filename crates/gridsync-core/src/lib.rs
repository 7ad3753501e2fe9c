//! # gridsync-core - Core Domain Types
//!
//! Foundation crate for gridsync. Provides domain types, error handling,
//! logging, conditional formatting, cell formatters and the behavior registry.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, regex, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`GridSnapshot`] - Rows plus original type metadata, replaced wholesale on reload
//! - [`ColumnState`] - Ordered, opaque per-column view attributes
//! - [`UpdateTrigger`] - Immediate or debounced view event that notifies the host
//! - [`DataReturnMode`] - Which rows the payload carries
//! - [`ReturnPayload`] - The value handed back to the host
//! - [`RowTransaction`] - Incremental add/update/remove change set
//!
//! ### Conditional Formatting (`gradient`)
//! - [`GradientColorEngine`] - Ranks values and blends two endpoint colors
//! - [`FormattingDomain`] - Sorted unique values, fixed at construction
//!
//! ### Behavior (`behavior`)
//! - [`BehaviorReconstructor`] - Binds sentinel-wrapped config text to registered behavior
//! - [`BehaviorRegistry`] - The closed set of behaviors a host may name
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! ```rust
//! use gridsync_core::prelude::*;
//! ```

pub mod behavior;
pub mod error;
pub mod format;
pub mod gradient;
pub mod logging;
pub mod stylesheet;
pub mod types;

/// Prelude for common imports used throughout all gridsync crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use behavior::{
    BehaviorReconstructor, BehaviorRegistry, BoundBehavior, ConfigMap, ConfigNode, FnBehavior,
    BEHAVIOR_SENTINEL,
};
pub use error::{Error, Result, ResultExt};
pub use gradient::{
    FormattingDomain, GradientColorEngine, GradientPalette, Rgb, CONDITIONAL_FORMAT_TYPE,
    NAN_SENTINEL,
};
pub use stylesheet::CssDict;
pub use types::{
    selected_item, ColumnState, ColumnStateEntry, DataReturnMode, GridSnapshot, ReturnPayload,
    Row, RowTransaction, SortDirection, TransactionResult, UpdateTrigger, ROW_INDEX_KEY,
};
