//! Message representation handed to the transport.
//!
//! A [`Message`] is a body plus headers plus properties. Producers move the
//! message into `send`, imprint their configuration onto it, and hand it back
//! inside the [`Completion`](crate::listener::Completion) once the send has
//! finished.

mod property;

use std::collections::BTreeMap;
use std::time::SystemTime;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::destination::Destination;
use crate::error::{SendError, SendResult};

pub use property::{PropertyMap, PropertyValue};
pub(crate) use property::check_name;

/// Default priority for new messages and producers.
pub const DEFAULT_PRIORITY: u8 = 4;
/// Highest legal priority.
pub const MAX_PRIORITY: u8 = 9;

/// Whether the transport must keep the message across its own failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    #[default]
    Persistent,
    NonPersistent,
}

/// Correlation id, either text or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelationId {
    Text(String),
    Bytes(Vec<u8>),
}

impl CorrelationId {
    /// Text form. Byte ids render as standard base64.
    pub fn as_text(&self) -> String {
        match self {
            CorrelationId::Text(s) => s.clone(),
            CorrelationId::Bytes(b) => STANDARD.encode(b),
        }
    }

    /// Byte form. Text ids yield their UTF-8 bytes.
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            CorrelationId::Text(s) => s.as_bytes().to_vec(),
            CorrelationId::Bytes(b) => b.clone(),
        }
    }
}

/// A value inside a map body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapValue {
    Scalar(PropertyValue),
    Bytes(Vec<u8>),
}

/// Message payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Bytes(Vec<u8>),
    Map(BTreeMap<String, MapValue>),
    /// bitcode-encoded serde value.
    Object(Vec<u8>),
}

impl Body {
    /// Build a map body from a JSON object.
    ///
    /// Keys must be non-empty. Values must be scalars or arrays of integers in
    /// `0..=255` (stored as bytes); anything else is a format error.
    pub fn from_json_map(map: &Map<String, Value>) -> SendResult<Self> {
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            if key.is_empty() {
                return Err(SendError::format("map entry names must not be empty"));
            }
            let entry = match value {
                Value::Array(items) => MapValue::Bytes(json_bytes(key, items)?),
                scalar => MapValue::Scalar(PropertyValue::from_json(scalar).map_err(|e| {
                    SendError::format(format!("map entry `{}`: {}", key, e))
                })?),
            };
            entries.insert(key.clone(), entry);
        }
        Ok(Body::Map(entries))
    }

    /// Encode any serializable value as an object body.
    pub fn object<T: Serialize>(value: &T) -> SendResult<Self> {
        Ok(Body::Object(bitcode::serialize(value)?))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Text(_) => "text",
            Body::Bytes(_) => "bytes",
            Body::Map(_) => "map",
            Body::Object(_) => "object",
        }
    }
}

fn json_bytes(key: &str, items: &[Value]) -> SendResult<Vec<u8>> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| u8::try_from(n).ok())
                .ok_or_else(|| {
                    SendError::format(format!(
                        "map entry `{}`: arrays must contain bytes (0..=255)",
                        key
                    ))
                })
        })
        .collect()
}

/// Header fields. Some are set by the application, the rest are stamped by
/// the producer at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headers {
    pub message_id: Option<String>,
    pub timestamp: Option<SystemTime>,
    pub correlation_id: Option<CorrelationId>,
    pub message_type: Option<String>,
    pub reply_to: Option<Destination>,
    pub destination: Option<Destination>,
    pub delivery_mode: DeliveryMode,
    pub priority: u8,
    pub expiration: Option<SystemTime>,
    pub delivery_time: Option<SystemTime>,
}

impl Default for Headers {
    fn default() -> Self {
        Self {
            message_id: None,
            timestamp: None,
            correlation_id: None,
            message_type: None,
            reply_to: None,
            destination: None,
            delivery_mode: DeliveryMode::default(),
            priority: DEFAULT_PRIORITY,
            expiration: None,
            delivery_time: None,
        }
    }
}

/// An outgoing (or delivered) message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    headers: Headers,
    properties: PropertyMap,
    body: Body,
    #[serde(default)]
    properties_read_only: bool,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(body: Body) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::with_body(Body::Text(text.into()))
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_body(Body::Bytes(bytes.into()))
    }

    /// Object message with a bitcode-encoded payload.
    pub fn encode<T: Serialize>(value: &T) -> SendResult<Self> {
        Ok(Self::with_body(Body::object(value)?))
    }

    /// Decode an object payload.
    pub fn decode<T: DeserializeOwned>(&self) -> SendResult<T> {
        match &self.body {
            Body::Object(bytes) => Ok(bitcode::deserialize(bytes)?),
            other => Err(SendError::format(format!(
                "cannot decode a {} body as an object",
                other.kind()
            ))),
        }
    }

    // Getters
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn text_body(&self) -> Option<&str> {
        match &self.body {
            Body::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        self.headers.message_id.as_deref()
    }

    pub fn priority(&self) -> u8 {
        self.headers.priority
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.headers.delivery_mode
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.headers.destination.as_ref()
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.headers.correlation_id.as_ref().map(CorrelationId::as_text)
    }

    pub fn is_properties_read_only(&self) -> bool {
        self.properties_read_only
    }

    // Application-settable state
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.headers.correlation_id = Some(CorrelationId::Text(id.into()));
    }

    pub fn set_correlation_id_bytes(&mut self, id: &[u8]) {
        self.headers.correlation_id = Some(CorrelationId::Bytes(id.to_vec()));
    }

    pub fn set_message_type(&mut self, message_type: impl Into<String>) {
        self.headers.message_type = Some(message_type.into());
    }

    pub fn set_reply_to(&mut self, reply_to: Option<Destination>) {
        self.headers.reply_to = reply_to;
    }

    /// Set a property. Fails with [`SendError::State`] when properties are
    /// read-only and [`SendError::Validation`] on an empty name.
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> SendResult<()> {
        self.ensure_properties_writable()?;
        self.properties.set(name, value)
    }

    /// Remove every property and make them writable again.
    pub fn clear_properties(&mut self) {
        self.properties.clear();
        self.properties_read_only = false;
    }

    pub(crate) fn ensure_properties_writable(&self) -> SendResult<()> {
        if self.properties_read_only {
            return Err(SendError::state("message properties are read-only"));
        }
        Ok(())
    }

    pub(crate) fn mark_properties_read_only(&mut self) {
        self.properties_read_only = true;
    }

    pub(crate) fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }
}
