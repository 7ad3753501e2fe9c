//! Delivery of payloads to the host

use tokio::sync::mpsc;

use gridsync_core::prelude::*;
use gridsync_core::ReturnPayload;

/// The host side of the component boundary.
///
/// Called synchronously from the message loop once per dispatch; an
/// implementation must hand the payload off without blocking.
#[cfg_attr(test, mockall::automock)]
pub trait HostChannel: Send {
    fn set_component_value(&self, payload: &ReturnPayload) -> Result<()>;
}

/// [`HostChannel`] that forwards payloads into an mpsc channel
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::Sender<ReturnPayload>,
}

impl ChannelHost {
    pub fn new(tx: mpsc::Sender<ReturnPayload>) -> Self {
        Self { tx }
    }

    /// A host plus the receiver its payloads arrive on
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReturnPayload>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl HostChannel for ChannelHost {
    fn set_component_value(&self, payload: &ReturnPayload) -> Result<()> {
        self.tx.try_send(payload.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::host("host is not keeping up, payload dropped"),
            mpsc::error::TrySendError::Closed(_) => Error::host("host receiver was dropped"),
        })
    }
}
