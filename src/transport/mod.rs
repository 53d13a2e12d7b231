//! Transport - the collaborator that actually moves messages.
//!
//! The dispatch lane only needs two operations from a transport: an optional
//! pre-admission destination check, and `deliver`. Network, in-process and
//! disk providers all fit behind this trait.
//!
//! ```text
//! ┌──────────────┐   send()    ┌──────────────┐  deliver()  ┌──────────────────┐
//! │   Producer   │ ──────────▶ │ DispatchLane │ ──────────▶ │ dyn Transport    │
//! └──────────────┘             └──────────────┘             │ InMemoryTransport│
//!                                                           │ (or external)    │
//!                                                           └──────────────────┘
//! ```

mod in_memory;

pub use in_memory::{Delivery, InMemoryTransport};

use crate::destination::Destination;
use crate::error::TransportError;
use crate::message::Message;

/// Transport execution service.
///
/// `deliver` returns only once the message is handed off with the transport's
/// full durability guarantee; a successful return is what completes a send.
pub trait Transport: Send + Sync {
    /// Check a destination before a task is admitted. Errors here are raised
    /// synchronously from `send`.
    fn check_destination(&self, _destination: &Destination) -> Result<(), TransportError> {
        Ok(())
    }

    /// Deliver one message.
    fn deliver(&self, destination: &Destination, message: &Message) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn check_destination(&self, destination: &Destination) -> Result<(), TransportError> {
        (**self).check_destination(destination)
    }

    fn deliver(&self, destination: &Destination, message: &Message) -> Result<(), TransportError> {
        (**self).deliver(destination, message)
    }
}
