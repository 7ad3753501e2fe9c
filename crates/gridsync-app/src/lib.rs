//! gridsync-app - Component state and orchestration for gridsync
//!
//! This crate implements the TEA (The Elm Architecture) message loop of a grid
//! component: host properties and settings, the state bridge between host
//! updates and the view, update trigger dispatch with debouncing, payload
//! assembly, column types, and the view traits with an in-memory view.

pub mod bridge;
pub mod column_types;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod frame;
pub mod host;
pub mod message;
pub mod payload;
pub mod view;

// Re-export primary types
pub use bridge::{derive_state, render, BridgeState, ReloadSignal};
pub use column_types::CellPresentation;
pub use config::{HostProps, Settings};
pub use dispatcher::{Debouncer, TriggerKey, UpdateDispatcher};
pub use engine::GridComponent;
pub use frame::{ComponentFrame, ContainerLayout, RecordingFrame, SharedFrame};
pub use host::{ChannelHost, HostChannel};
pub use message::Message;
pub use payload::ReturnValueBuilder;
pub use view::{EventSource, GridView, InMemoryGrid, RowModel};

// Re-export live types used in messages
pub use gridsync_live::{ConnectionState, LiveEvent};
