//! Error types for producer configuration, admission and execution.

use std::fmt;

use thiserror::Error;

use crate::producer::TaskId;

/// Convenience alias used throughout the crate.
pub type SendResult<T> = Result<T, SendError>;

/// Where in a send's life an error was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Raised inside `send` before the task was admitted. Nothing was attempted.
    Admission,
    /// Reported by the transport after the task started executing.
    Execution,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Admission => write!(f, "admission"),
            Phase::Execution => write!(f, "execution"),
        }
    }
}

/// Error type for every fallible producer, context and lane operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    /// Bad argument (empty property name, out-of-range priority, bad lane config).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Property coercion failed or a payload shorthand is malformed.
    #[error("message format error: {0}")]
    Format(String),

    /// The destination is missing or was rejected by the transport.
    #[error("invalid destination `{destination}` during {phase}: {reason}")]
    InvalidDestination {
        destination: String,
        phase: Phase,
        reason: String,
    },

    /// The operation is not legal in the current state (closed context,
    /// reentrant drain, read-only message properties).
    #[error("illegal state: {0}")]
    State(String),

    /// The transport failed while executing the task.
    #[error("transport failure for {task} to `{destination}`: {reason}")]
    Transport {
        task: TaskId,
        destination: String,
        reason: String,
    },
}

impl SendError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SendError::Validation(msg.into())
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        SendError::Format(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        SendError::State(msg.into())
    }

    /// True when the transport was actually asked to deliver the message.
    ///
    /// Admission-time errors return false: the task never reached the lane.
    pub fn was_attempted(&self) -> bool {
        match self {
            SendError::Transport { .. } => true,
            SendError::InvalidDestination { phase, .. } => *phase == Phase::Execution,
            _ => false,
        }
    }

    /// The phase in which this error surfaced.
    pub fn phase(&self) -> Phase {
        if self.was_attempted() {
            Phase::Execution
        } else {
            Phase::Admission
        }
    }
}

impl From<bitcode::Error> for SendError {
    fn from(err: bitcode::Error) -> Self {
        SendError::Format(format!("object payload encoding failed: {}", err))
    }
}

impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        SendError::Format(err.to_string())
    }
}

/// Error reported by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The destination does not exist on this transport.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// The transport refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The transport could not be reached or failed internally.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Attach task and destination context, producing the caller-facing error.
    pub(crate) fn into_send_error(self, task: TaskId, destination: &str, phase: Phase) -> SendError {
        match self {
            TransportError::UnknownDestination(reason) => SendError::InvalidDestination {
                destination: destination.to_string(),
                phase,
                reason,
            },
            other => SendError::Transport {
                task,
                destination: destination.to_string(),
                reason: other.to_string(),
            },
        }
    }
}
