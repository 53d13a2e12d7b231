//! In-memory transport for testing and single-process scenarios.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Transport;
use crate::destination::Destination;
use crate::error::TransportError;
use crate::message::Message;

/// A message as the transport received it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub destination: Destination,
    pub message: Message,
}

/// In-memory transport that records every delivered message.
///
/// Features:
/// - Thread-safe (clones share the same log)
/// - Optional strict mode: only registered destinations are accepted
/// - Delivered copies have read-only properties, like received messages
///
/// ## Example
///
/// ```
/// use sendlane::{Destination, InMemoryTransport, Message, Transport};
///
/// let transport = InMemoryTransport::new();
/// let orders = Destination::queue("orders");
/// transport.deliver(&orders, &Message::text("hello")).unwrap();
///
/// assert_eq!(transport.len(), 1);
/// assert_eq!(transport.find_by_destination(&orders).len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    log: Arc<RwLock<Vec<Delivery>>>,
    /// When `Some`, only these destinations exist.
    known: Arc<RwLock<Option<HashSet<Destination>>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that rejects every destination not registered
    /// with [`register`](Self::register).
    pub fn strict() -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            known: Arc::new(RwLock::new(Some(HashSet::new()))),
        }
    }

    /// Register a destination. Turns a permissive transport strict.
    pub fn register(&self, destination: Destination) {
        self.known
            .write()
            .get_or_insert_with(HashSet::new)
            .insert(destination);
    }

    /// Get all deliveries in order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.log.read().clone()
    }

    /// Get all delivered messages in order.
    pub fn messages(&self) -> Vec<Message> {
        self.log.read().iter().map(|d| d.message.clone()).collect()
    }

    /// Find every delivery made to a destination.
    pub fn find_by_destination(&self, destination: &Destination) -> Vec<Message> {
        self.log
            .read()
            .iter()
            .filter(|d| d.destination == *destination)
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.read().is_empty()
    }

    /// Clear the delivery log (useful for test cleanup).
    pub fn clear(&self) {
        self.log.write().clear();
    }

    fn is_known(&self, destination: &Destination) -> bool {
        match &*self.known.read() {
            Some(known) => known.contains(destination),
            None => true,
        }
    }
}

impl Transport for InMemoryTransport {
    fn check_destination(&self, destination: &Destination) -> Result<(), TransportError> {
        if self.is_known(destination) {
            Ok(())
        } else {
            Err(TransportError::UnknownDestination(destination.to_string()))
        }
    }

    fn deliver(&self, destination: &Destination, message: &Message) -> Result<(), TransportError> {
        self.check_destination(destination)?;
        let mut copy = message.clone();
        copy.mark_properties_read_only();
        self.log.write().push(Delivery {
            destination: destination.clone(),
            message: copy,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_and_find() {
        let transport = InMemoryTransport::new();
        let a = Destination::queue("a");
        let b = Destination::topic("b");

        transport.deliver(&a, &Message::text("1")).unwrap();
        transport.deliver(&b, &Message::text("2")).unwrap();
        transport.deliver(&a, &Message::text("3")).unwrap();

        assert_eq!(transport.len(), 3);
        let to_a: Vec<_> = transport
            .find_by_destination(&a)
            .into_iter()
            .map(|m| m.text_body().unwrap().to_string())
            .collect();
        assert_eq!(to_a, vec!["1", "3"]);
    }

    #[test]
    fn strict_rejects_unknown() {
        let transport = InMemoryTransport::strict();
        let known = Destination::queue("known");
        transport.register(known.clone());

        assert!(transport.check_destination(&known).is_ok());
        let err = transport
            .deliver(&Destination::queue("other"), &Message::new())
            .unwrap_err();
        assert!(matches!(err, TransportError::UnknownDestination(_)));
        assert!(transport.is_empty());
    }

    #[test]
    fn delivered_copies_are_read_only() {
        let transport = InMemoryTransport::new();
        transport
            .deliver(&Destination::queue("q"), &Message::text("x"))
            .unwrap();
        let mut delivered = transport.messages().remove(0);
        assert!(delivered.is_properties_read_only());
        assert!(delivered.set_property("late", 1i32).is_err());
    }

    #[test]
    fn clear_resets_log() {
        let transport = InMemoryTransport::new();
        transport
            .deliver(&Destination::queue("q"), &Message::new())
            .unwrap();
        transport.clear();
        assert!(transport.is_empty());
    }
}
