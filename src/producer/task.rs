use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::destination::Destination;
use crate::error::{SendError, SendResult};
use crate::listener::CompletionListener;
use crate::message::{CorrelationId, DeliveryMode, Message, PropertyMap};

/// Identity of one send attempt, unique within its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a send task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Submitted,
    Executing,
    Completed,
    Failed,
}

/// Copy of the producer's configuration taken when `send` was called.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    pub delivery_mode: DeliveryMode,
    pub priority: u8,
    pub time_to_live: Duration,
    pub delivery_delay: Duration,
    pub disable_message_id: bool,
    pub disable_timestamp: bool,
    pub correlation_id: Option<CorrelationId>,
    pub message_type: Option<String>,
    pub reply_to: Option<Destination>,
    pub properties: PropertyMap,
}

impl ConfigSnapshot {
    /// Write send options, provider-set headers and overlay values onto a
    /// message. Overlay headers and properties replace what the message
    /// already carries.
    ///
    /// Fails without touching the message when the expiration or delivery
    /// time cannot be represented.
    pub(crate) fn imprint(
        &self,
        message: &mut Message,
        destination: &Destination,
        message_id: Option<String>,
        now: SystemTime,
    ) -> SendResult<()> {
        let expiration = if self.time_to_live.is_zero() {
            None
        } else {
            Some(deadline(now, self.time_to_live, "time to live")?)
        };
        let delivery_time = deadline(now, self.delivery_delay, "delivery delay")?;

        let headers = message.headers_mut();
        headers.destination = Some(destination.clone());
        headers.delivery_mode = self.delivery_mode;
        headers.priority = self.priority;
        headers.message_id = if self.disable_message_id {
            None
        } else {
            message_id
        };
        headers.timestamp = if self.disable_timestamp {
            None
        } else {
            Some(now)
        };
        headers.expiration = expiration;
        headers.delivery_time = Some(delivery_time);

        if let Some(id) = &self.correlation_id {
            headers.correlation_id = Some(id.clone());
        }
        if let Some(message_type) = &self.message_type {
            headers.message_type = Some(message_type.clone());
        }
        if let Some(reply_to) = &self.reply_to {
            headers.reply_to = Some(reply_to.clone());
        }

        message.properties_mut().overlay(&self.properties);
        Ok(())
    }
}

fn deadline(now: SystemTime, offset: Duration, what: &str) -> SendResult<SystemTime> {
    now.checked_add(offset).ok_or_else(|| {
        SendError::validation(format!("{} of {:?} is out of range", what, offset))
    })
}

/// One admitted send: immutable after construction.
///
/// The message inside is owned by the dispatch lane until the task's
/// notification fires (async) or `send` returns (sync).
pub struct SendTask {
    pub(crate) id: TaskId,
    pub(crate) destination: Destination,
    pub(crate) message: Message,
    pub(crate) snapshot: ConfigSnapshot,
    pub(crate) listener: Option<Arc<dyn CompletionListener>>,
}

impl SendTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    pub fn is_async(&self) -> bool {
        self.listener.is_some()
    }
}

impl fmt::Debug for SendTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendTask")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("body", &self.message.body().kind())
            .field("async", &self.is_async())
            .finish()
    }
}
