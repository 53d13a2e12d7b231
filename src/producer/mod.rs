//! Producer facade - the chainable surface application code sends through.
//!
//! A producer pairs a [`Context`] with its own [`ProducerConfig`] overlay.
//! Producers are cheap: create one per component and drop it freely, there is
//! nothing to close.
//!
//! ## Modes
//!
//! - **Synchronous** (default): `send` returns once the transport reported
//!   the outcome. Transport failures are returned to the caller.
//! - **Asynchronous**: after [`Producer::set_async`], `send` returns as soon
//!   as the task is admitted; the outcome arrives at the listener, in call
//!   order, on the context's notifier thread.
//!
//! Errors that can be detected inside `send` (closed context, bad
//! destination, malformed payload) are always returned directly and never
//! reach a listener.
//!
//! ## Example
//!
//! ```ignore
//! let mut producer = context.create_producer()?;
//! producer
//!     .set_priority(7)?
//!     .set_time_to_live(Duration::from_millis(5000))
//!     .set_property("k1", true)?;
//!
//! producer.send_text(&Destination::queue("orders"), "hello")?;
//! ```

mod config;
mod task;

pub use config::ProducerConfig;
pub use task::{ConfigSnapshot, SendTask, TaskId, TaskState};

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::context::Context;
use crate::destination::Destination;
use crate::error::SendResult;
use crate::listener::CompletionListener;
use crate::message::{Body, CorrelationId, DeliveryMode, Message, PropertyValue};

/// What `send_tracked` hands back.
#[derive(Debug)]
pub struct SendReceipt {
    pub task: TaskId,
    /// The sent message for synchronous sends. `None` in asynchronous mode:
    /// the message comes back in the completion instead.
    pub message: Option<Message>,
}

/// Sends messages on a context, imprinting its overlay on each one.
pub struct Producer {
    context: Context,
    config: ProducerConfig,
}

impl Producer {
    pub(crate) fn new(context: Context) -> Self {
        Self {
            context,
            config: ProducerConfig::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    // ========================================================================
    // Send options
    // ========================================================================

    pub fn set_delivery_mode(&mut self, mode: DeliveryMode) -> &mut Self {
        self.config.set_delivery_mode(mode);
        self
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.config.delivery_mode()
    }

    /// Fails with a validation error for priorities above 9.
    pub fn set_priority(&mut self, priority: u8) -> SendResult<&mut Self> {
        self.config.set_priority(priority)?;
        Ok(self)
    }

    pub fn priority(&self) -> u8 {
        self.config.priority()
    }

    pub fn set_time_to_live(&mut self, ttl: Duration) -> &mut Self {
        self.config.set_time_to_live(ttl);
        self
    }

    pub fn time_to_live(&self) -> Duration {
        self.config.time_to_live()
    }

    pub fn set_delivery_delay(&mut self, delay: Duration) -> &mut Self {
        self.config.set_delivery_delay(delay);
        self
    }

    pub fn delivery_delay(&self) -> Duration {
        self.config.delivery_delay()
    }

    pub fn set_disable_message_id(&mut self, value: bool) -> &mut Self {
        self.config.set_disable_message_id(value);
        self
    }

    pub fn disable_message_id(&self) -> bool {
        self.config.disable_message_id()
    }

    pub fn set_disable_message_timestamp(&mut self, value: bool) -> &mut Self {
        self.config.set_disable_timestamp(value);
        self
    }

    pub fn disable_message_timestamp(&self) -> bool {
        self.config.disable_timestamp()
    }

    /// Switch later sends to asynchronous mode.
    pub fn set_async(&mut self, listener: Arc<dyn CompletionListener>) -> &mut Self {
        self.config.set_completion_listener(Some(listener));
        self
    }

    /// Switch later sends back to synchronous mode.
    pub fn set_sync(&mut self) -> &mut Self {
        self.config.set_completion_listener(None);
        self
    }

    pub fn set_completion_listener(
        &mut self,
        listener: Option<Arc<dyn CompletionListener>>,
    ) -> &mut Self {
        self.config.set_completion_listener(listener);
        self
    }

    pub fn completion_listener(&self) -> Option<&Arc<dyn CompletionListener>> {
        self.config.completion_listener()
    }

    pub fn is_async(&self) -> bool {
        self.config.is_async()
    }

    // ========================================================================
    // Headers
    // ========================================================================

    pub fn set_correlation_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.config
            .set_correlation_id(Some(CorrelationId::Text(id.into())));
        self
    }

    /// The bytes are copied; later changes to the caller's buffer do not
    /// leak into the overlay.
    pub fn set_correlation_id_bytes(&mut self, id: &[u8]) -> &mut Self {
        self.config
            .set_correlation_id(Some(CorrelationId::Bytes(id.to_vec())));
        self
    }

    pub fn clear_correlation_id(&mut self) -> &mut Self {
        self.config.set_correlation_id(None);
        self
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.config.correlation_id().map(CorrelationId::as_text)
    }

    pub fn correlation_id_bytes(&self) -> Option<Vec<u8>> {
        self.config.correlation_id().map(CorrelationId::as_bytes)
    }

    pub fn set_message_type(&mut self, message_type: Option<String>) -> &mut Self {
        self.config.set_message_type(message_type);
        self
    }

    pub fn message_type(&self) -> Option<&str> {
        self.config.message_type()
    }

    pub fn set_reply_to(&mut self, reply_to: Option<Destination>) -> &mut Self {
        self.config.set_reply_to(reply_to);
        self
    }

    pub fn reply_to(&self) -> Option<&Destination> {
        self.config.reply_to()
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> SendResult<&mut Self> {
        self.config.set_property(name, value)?;
        Ok(self)
    }

    pub fn set_object_property(
        &mut self,
        name: impl Into<String>,
        value: &Value,
    ) -> SendResult<&mut Self> {
        self.config.set_object_property(name, value)?;
        Ok(self)
    }

    pub fn clear_properties(&mut self) -> &mut Self {
        self.config.clear_properties();
        self
    }

    pub fn property_exists(&self, name: &str) -> bool {
        self.config.properties().contains(name)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.config.properties().names().map(str::to_string).collect()
    }

    pub fn get_object_property(&self, name: &str) -> Option<Value> {
        self.config.properties().get(name).map(PropertyValue::to_json)
    }

    pub fn get_bool_property(&self, name: &str) -> SendResult<bool> {
        self.config.properties().get_bool(name)
    }

    pub fn get_byte_property(&self, name: &str) -> SendResult<i8> {
        self.config.properties().get_byte(name)
    }

    pub fn get_short_property(&self, name: &str) -> SendResult<i16> {
        self.config.properties().get_short(name)
    }

    pub fn get_int_property(&self, name: &str) -> SendResult<i32> {
        self.config.properties().get_int(name)
    }

    pub fn get_long_property(&self, name: &str) -> SendResult<i64> {
        self.config.properties().get_long(name)
    }

    pub fn get_float_property(&self, name: &str) -> SendResult<f32> {
        self.config.properties().get_float(name)
    }

    pub fn get_double_property(&self, name: &str) -> SendResult<f64> {
        self.config.properties().get_double(name)
    }

    pub fn get_string_property(&self, name: &str) -> Option<String> {
        self.config.properties().get_string(name)
    }

    // ========================================================================
    // Send family
    // ========================================================================

    /// Send a prepared message. The overlay's headers and properties replace
    /// values of the same name already on the message.
    pub fn send(&mut self, destination: &Destination, message: Message) -> SendResult<&mut Self> {
        self.dispatch(destination, || Ok(message))?;
        Ok(self)
    }

    pub fn send_text(
        &mut self,
        destination: &Destination,
        text: impl Into<String>,
    ) -> SendResult<&mut Self> {
        let text = text.into();
        self.dispatch(destination, || Ok(Message::text(text)))?;
        Ok(self)
    }

    pub fn send_bytes(&mut self, destination: &Destination, bytes: &[u8]) -> SendResult<&mut Self> {
        self.dispatch(destination, || Ok(Message::bytes(bytes)))?;
        Ok(self)
    }

    /// Map payload. Keys must be non-empty and values scalar or byte arrays.
    pub fn send_map(
        &mut self,
        destination: &Destination,
        map: &Map<String, Value>,
    ) -> SendResult<&mut Self> {
        self.dispatch(destination, || Ok(Message::with_body(Body::from_json_map(map)?)))?;
        Ok(self)
    }

    /// Object payload, bitcode-encoded.
    pub fn send_object<T: Serialize>(
        &mut self,
        destination: &Destination,
        value: &T,
    ) -> SendResult<&mut Self> {
        self.dispatch(destination, || Message::encode(value))?;
        Ok(self)
    }

    /// Like [`send`](Self::send), returning the task id and (sync mode) the
    /// message as the transport saw it.
    pub fn send_tracked(
        &mut self,
        destination: &Destination,
        message: Message,
    ) -> SendResult<SendReceipt> {
        self.dispatch(destination, || Ok(message))
    }

    fn dispatch<F>(&mut self, destination: &Destination, build: F) -> SendResult<SendReceipt>
    where
        F: FnOnce() -> SendResult<Message>,
    {
        self.context.ensure_open()?;
        self.context.check_destination(destination)?;

        let mut message = build()?;
        let snapshot = self.config.snapshot();
        if !snapshot.properties.is_empty() {
            message.ensure_properties_writable()?;
        }

        let id = self.context.next_task_id();
        trace!(context = self.context.id(), task = %id, state = ?TaskState::Created, "task created");
        let message_id = format!("ID:{}-{}", self.context.id(), id.0);
        snapshot.imprint(&mut message, destination, Some(message_id), SystemTime::now())?;

        let task = SendTask {
            id,
            destination: destination.clone(),
            message,
            snapshot,
            listener: self.config.completion_listener().cloned(),
        };
        debug!(
            context = self.context.id(),
            task = %id,
            destination = %destination,
            async_mode = task.is_async(),
            "send admitted"
        );

        if task.is_async() {
            self.context.submit(task)?;
            Ok(SendReceipt { task: id, message: None })
        } else {
            self.context.run_inline(&task)?;
            Ok(SendReceipt {
                task: id,
                message: Some(task.message),
            })
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("context", &self.context.id())
            .field("config", &self.config)
            .finish()
    }
}
