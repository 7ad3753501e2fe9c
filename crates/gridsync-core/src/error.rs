//! Component error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Component error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Dataset / Formatting Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Row data could not be loaded: {message}")]
    RowData { message: String },

    #[error("Conditional formatting setup failed: {message}")]
    Formatting { message: String },

    #[error("Invalid color {value:?}: expected #RRGGBB")]
    InvalidColor { value: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // View / Host Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Grid view error: {message}")]
    View { message: String },

    #[error("Host delivery failed: {message}")]
    Host { message: String },

    // ─────────────────────────────────────────────────────────────
    // Live Transaction Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Live channel error: {message}")]
    Live { message: String },

    #[error("Live message rejected: {message}")]
    LiveProtocol { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn row_data(message: impl Into<String>) -> Self {
        Self::RowData {
            message: message.into(),
        }
    }

    pub fn formatting(message: impl Into<String>) -> Self {
        Self::Formatting {
            message: message.into(),
        }
    }

    pub fn invalid_color(value: impl Into<String>) -> Self {
        Self::InvalidColor {
            value: value.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn view(message: impl Into<String>) -> Self {
        Self::View {
            message: message.into(),
        }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }

    pub fn live(message: impl Into<String>) -> Self {
        Self::Live {
            message: message.into(),
        }
    }

    pub fn live_protocol(message: impl Into<String>) -> Self {
        Self::LiveProtocol {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors leave the view stalled or unchanged but the
    /// component keeps running.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::View { .. }
                | Error::Host { .. }
                | Error::Live { .. }
                | Error::LiveProtocol { .. }
        )
    }

    /// Check if this error should abort construction or reload
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::RowData { .. }
                | Error::Formatting { .. }
                | Error::InvalidColor { .. }
                | Error::Config { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
