//! gridsync Library
//!
//! Headless runner for the gridsync grid component.

pub mod headless;

// Re-export main entry point
pub use headless::runner::run_headless;
