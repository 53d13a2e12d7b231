//! The per-producer configuration overlay.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::task::ConfigSnapshot;
use crate::destination::Destination;
use crate::error::{SendError, SendResult};
use crate::listener::CompletionListener;
use crate::message::{
    check_name, CorrelationId, DeliveryMode, PropertyMap, PropertyValue, DEFAULT_PRIORITY,
    MAX_PRIORITY,
};

/// Send options, headers and properties imprinted on every message a
/// producer sends.
///
/// Mutations never block and never touch the dispatch lane; each send takes a
/// [`ConfigSnapshot`] so later changes cannot reach tasks already admitted.
#[derive(Clone)]
pub struct ProducerConfig {
    delivery_mode: DeliveryMode,
    priority: u8,
    time_to_live: Duration,
    delivery_delay: Duration,
    disable_message_id: bool,
    disable_timestamp: bool,
    correlation_id: Option<CorrelationId>,
    message_type: Option<String>,
    reply_to: Option<Destination>,
    properties: PropertyMap,
    completion_listener: Option<Arc<dyn CompletionListener>>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            delivery_mode: DeliveryMode::Persistent,
            priority: DEFAULT_PRIORITY,
            time_to_live: Duration::ZERO,
            delivery_delay: Duration::ZERO,
            disable_message_id: false,
            disable_timestamp: false,
            correlation_id: None,
            message_type: None,
            reply_to: None,
            properties: PropertyMap::new(),
            completion_listener: None,
        }
    }
}

impl fmt::Debug for ProducerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerConfig")
            .field("delivery_mode", &self.delivery_mode)
            .field("priority", &self.priority)
            .field("time_to_live", &self.time_to_live)
            .field("delivery_delay", &self.delivery_delay)
            .field("disable_message_id", &self.disable_message_id)
            .field("disable_timestamp", &self.disable_timestamp)
            .field("correlation_id", &self.correlation_id)
            .field("message_type", &self.message_type)
            .field("reply_to", &self.reply_to)
            .field("properties", &self.properties)
            .field("async", &self.completion_listener.is_some())
            .finish()
    }
}

impl ProducerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // Send options

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    pub fn set_delivery_mode(&mut self, mode: DeliveryMode) {
        self.delivery_mode = mode;
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Priorities above 9 are rejected rather than clamped.
    pub fn set_priority(&mut self, priority: u8) -> SendResult<()> {
        if priority > MAX_PRIORITY {
            return Err(SendError::validation(format!(
                "priority {} is outside 0..={}",
                priority, MAX_PRIORITY
            )));
        }
        self.priority = priority;
        Ok(())
    }

    /// Zero means messages never expire.
    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    pub fn set_time_to_live(&mut self, ttl: Duration) {
        self.time_to_live = ttl;
    }

    pub fn delivery_delay(&self) -> Duration {
        self.delivery_delay
    }

    pub fn set_delivery_delay(&mut self, delay: Duration) {
        self.delivery_delay = delay;
    }

    pub fn disable_message_id(&self) -> bool {
        self.disable_message_id
    }

    pub fn set_disable_message_id(&mut self, value: bool) {
        self.disable_message_id = value;
    }

    pub fn disable_timestamp(&self) -> bool {
        self.disable_timestamp
    }

    pub fn set_disable_timestamp(&mut self, value: bool) {
        self.disable_timestamp = value;
    }

    pub fn completion_listener(&self) -> Option<&Arc<dyn CompletionListener>> {
        self.completion_listener.as_ref()
    }

    /// `Some` switches later sends to asynchronous mode, `None` back to
    /// synchronous.
    pub fn set_completion_listener(&mut self, listener: Option<Arc<dyn CompletionListener>>) {
        self.completion_listener = listener;
    }

    pub fn is_async(&self) -> bool {
        self.completion_listener.is_some()
    }

    // Headers

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    pub fn set_correlation_id(&mut self, id: Option<CorrelationId>) {
        self.correlation_id = id;
    }

    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    pub fn set_message_type(&mut self, message_type: Option<String>) {
        self.message_type = message_type;
    }

    pub fn reply_to(&self) -> Option<&Destination> {
        self.reply_to.as_ref()
    }

    pub fn set_reply_to(&mut self, reply_to: Option<Destination>) {
        self.reply_to = reply_to;
    }

    // Properties

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> SendResult<()> {
        self.properties.set(name, value)
    }

    /// Set a property from a generic JSON value. The name is checked before
    /// the value.
    pub fn set_object_property(&mut self, name: impl Into<String>, value: &Value) -> SendResult<()> {
        let name = name.into();
        check_name(&name)?;
        let value = PropertyValue::from_json(value)?;
        self.properties.set(name, value)
    }

    /// Remove every property. Headers and send options are untouched.
    pub fn clear_properties(&mut self) {
        self.properties.clear();
    }

    /// Copy the current values for one send.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            delivery_mode: self.delivery_mode,
            priority: self.priority,
            time_to_live: self.time_to_live,
            delivery_delay: self.delivery_delay,
            disable_message_id: self.disable_message_id,
            disable_timestamp: self.disable_timestamp,
            correlation_id: self.correlation_id.clone(),
            message_type: self.message_type.clone(),
            reply_to: self.reply_to.clone(),
            properties: self.properties.clone(),
        }
    }
}
