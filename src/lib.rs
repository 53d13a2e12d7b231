//! Ordered send coordination for message producers.
//!
//! A [`Context`] owns a dispatch lane; [`Producer`]s created from it imprint
//! their configuration overlay on every message and send either synchronously
//! or asynchronously. Asynchronous outcomes reach a [`CompletionListener`] in
//! call order, one at a time, on the context's notifier thread.

mod config;
mod context;
mod destination;
mod error;
pub mod lane;
mod listener;
mod message;
mod producer;
pub mod transport;

pub use config::LaneConfig;
pub use context::Context;
pub use destination::{Destination, DestinationKind};
pub use error::{Phase, SendError, SendResult, TransportError};
pub use listener::{
    ChannelListener, Completion, CompletionListener, CompletionSummary, FnListener, Notification,
};
pub use message::{
    Body, CorrelationId, DeliveryMode, Headers, MapValue, Message, PropertyMap, PropertyValue,
    DEFAULT_PRIORITY, MAX_PRIORITY,
};
pub use producer::{ConfigSnapshot, Producer, ProducerConfig, SendReceipt, SendTask, TaskId, TaskState};
pub use transport::{Delivery, InMemoryTransport, Transport};

#[cfg(feature = "emitter")]
pub use listener::EmitterListener;

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
