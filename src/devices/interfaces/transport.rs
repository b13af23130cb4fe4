//! Inbound and outbound message exchange over the bus.
use crate::devices::protocol::{Ack, Frame};

/// Bus transport adapter.
///
/// Back-pressure is implicit: the transport holds at most one inbound
/// frame and will not deliver a second one before the first has been
/// acknowledged.
pub trait Transport {
    type Error: Copy + core::fmt::Debug;

    /// Whether a complete frame is waiting. Never blocks.
    fn has_new_message(&mut self) -> bool;

    /// Takes the pending frame.
    fn receive(&mut self) -> Result<Frame, Self::Error>;

    /// Replies with the outcome of processing the last frame.
    fn send(&mut self, ack: Ack) -> Result<(), Self::Error>;
}
