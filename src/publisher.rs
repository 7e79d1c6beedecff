//!
//! Hand-off of dispatch results to the downstream transport.
//!
use crate::error::BridgeError;
use tokio::sync::mpsc;

/// Accepts the ordered output of one invocation. Implementations deliver the elements in the
/// given order; duplicates are delivered once per occurrence.
pub trait Publisher<M>: Send + Sync {
    fn publish(&self, batch: Vec<M>) -> Result<(), BridgeError>;
}

/// Publisher that forwards every batch into a tokio channel, for a transport task to drain.
pub struct ChannelPublisher<M> {
    sender: mpsc::UnboundedSender<Vec<M>>,
}

impl<M> ChannelPublisher<M> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<M>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl<M: Send> Publisher<M> for ChannelPublisher<M> {
    fn publish(&self, batch: Vec<M>) -> Result<(), BridgeError> {
        self.sender
            .send(batch)
            .map_err(|_e| BridgeError::PublisherClosed)
    }
}
