//! Configuration for the grid component
//!
//! Supports:
//! - Host properties (JSON) - dataset, grid options and behavior flags
//! - `.gridsync/config.toml` - component settings

pub mod settings;
pub mod types;

pub use settings::{init_config_dir, load_settings};
pub use types::*;
