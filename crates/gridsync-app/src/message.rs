//! Message types for the component loop (TEA pattern)

use gridsync_live::LiveEvent;

use crate::config::HostProps;
use crate::dispatcher::TriggerKey;

/// Everything that can change the component, in arrival order
#[derive(Debug, Clone)]
pub enum Message {
    /// An update trigger fired (immediately, or after its debounce window)
    TriggerFired { key: TriggerKey },

    /// The host pressed the manual "Update" button
    ManualUpdate,

    /// The view rendered its first rows; columns can be sized
    FirstDataRendered,

    /// Event from the live transaction channel
    Live(LiveEvent),

    /// The host supplied new properties
    SetProps(Box<HostProps>),

    /// Stop the loop
    Quit,
}
