//! # gridsync-live - Live Row Transactions
//!
//! Streams incremental row patches into a grid over a WebSocket.
//!
//! ## Public API
//!
//! - [`LiveTransactionChannel`] - Owner handle for the background reader task
//! - [`LiveEvent`] - Transactions and connection state changes from the task
//! - [`ReconnectPolicy`] - Exponential backoff settings, or no reconnect at all
//! - [`parse_live_message`] - Frame → [`gridsync_core::RowTransaction`]
//! - [`sanitize_nan`] - Bare `NaN` → `null` repair applied before parsing

pub mod client;
pub mod protocol;

pub use client::{ConnectionState, LiveEvent, LiveTransactionChannel, ReconnectPolicy};
pub use protocol::{parse_live_message, sanitize_nan};
