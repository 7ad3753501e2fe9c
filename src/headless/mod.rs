//! Headless mode - NDJSON event output for scripted hosts and E2E testing
//!
//! The runner drives one grid component over the in-memory view and writes
//! structured JSON events to stdout, one per line.
//!
//! # Example Output
//!
//! ```json
//! {"event":"component_ready","rows":3,"triggers":["selectionChanged"],"manual":false,"class_name":"ag-theme-streamlit","width":"100%","height":"400px","timestamp":1704700001000}
//! {"event":"payload","value":{"originalDtypes":{},"rowData":[...],"selectedRows":[...],"selectedItems":[...],"colState":[...]},"timestamp":1704700002000}
//! {"event":"refreshed","at":"14:05:09","timestamp":1704700003000}
//! ```

pub mod runner;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};
use tracing::error;

use gridsync_app::ContainerLayout;
use gridsync_core::ReturnPayload;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// The grid is wired and holds its initial rows
    ComponentReady {
        rows: usize,
        triggers: Vec<String>,
        manual: bool,
        class_name: String,
        width: String,
        height: Option<String>,
        timestamp: i64,
    },

    /// A payload handed to the host
    Payload {
        value: ReturnPayload,
        timestamp: i64,
    },

    /// The stylesheet appended at construction
    Stylesheet { css: String, timestamp: i64 },

    /// A live transaction was applied
    Refreshed { at: String, timestamp: i64 },

    /// Displayed rows, rendered through the column types
    Cells { rows: Vec<Value>, timestamp: i64 },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        // NDJSON: one event per line, flushed immediately
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn component_ready(
        rows: usize,
        triggers: Vec<String>,
        manual: bool,
        layout: &ContainerLayout,
    ) -> Self {
        Self::ComponentReady {
            rows,
            triggers,
            manual,
            class_name: layout.class_name.clone(),
            width: layout.width.clone(),
            height: layout.height.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn payload(value: ReturnPayload) -> Self {
        Self::Payload {
            value,
            timestamp: Self::now(),
        }
    }

    pub fn stylesheet(css: &str) -> Self {
        Self::Stylesheet {
            css: css.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn refreshed(at: &str) -> Self {
        Self::Refreshed {
            at: at.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn cells(rows: Vec<Value>) -> Self {
        Self::Cells {
            rows,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }
}
