//! Completion notifications for asynchronous sends.
//!
//! A [`CompletionListener`] is the capability a producer is configured with to
//! switch into asynchronous mode. The dispatch lane invokes it from the
//! context's notifier thread only, one notification at a time, in the order the
//! sends were issued.
//!
//! ## Adapters
//!
//! - [`FnListener`] - a pair of closures
//! - [`ChannelListener`] - forwards every [`Notification`] into a crossbeam channel
//! - `EmitterListener` - forwards summaries to an `EventEmitter` (requires `emitter` feature)

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

use crate::destination::Destination;
use crate::error::SendError;
use crate::message::Message;
use crate::producer::{TaskId, TaskState};

/// The finished task handed to a listener. Ownership of the message returns
/// to the application here.
#[derive(Debug, Clone)]
pub struct Completion {
    pub task: TaskId,
    pub destination: Destination,
    pub message: Message,
    pub state: TaskState,
}

/// Receiver of asynchronous send outcomes.
///
/// Callbacks run on the notifier thread of the owning context. They must not
/// call `drain`, `close`, `commit` or `rollback` on that context; those calls
/// fail with [`SendError::State`].
pub trait CompletionListener: Send + Sync {
    /// The message reached the transport with the same guarantees as a
    /// synchronous send.
    fn on_success(&self, completion: Completion);

    /// The send failed after it was admitted.
    fn on_failure(&self, completion: Completion, error: SendError);
}

/// Listener built from two closures.
///
/// ```ignore
/// let listener = FnListener::new(
///     |done| println!("sent {}", done.task),
///     |done, err| eprintln!("{} failed: {}", done.task, err),
/// );
/// producer.set_async(Arc::new(listener));
/// ```
pub struct FnListener<S, F> {
    success: S,
    failure: F,
}

impl<S, F> FnListener<S, F>
where
    S: Fn(Completion) + Send + Sync,
    F: Fn(Completion, SendError) + Send + Sync,
{
    pub fn new(success: S, failure: F) -> Self {
        Self { success, failure }
    }
}

impl<S, F> CompletionListener for FnListener<S, F>
where
    S: Fn(Completion) + Send + Sync,
    F: Fn(Completion, SendError) + Send + Sync,
{
    fn on_success(&self, completion: Completion) {
        (self.success)(completion)
    }

    fn on_failure(&self, completion: Completion, error: SendError) {
        (self.failure)(completion, error)
    }
}

/// One delivered notification.
#[derive(Debug, Clone)]
pub enum Notification {
    Success(Completion),
    Failure(Completion, SendError),
}

impl Notification {
    pub fn completion(&self) -> &Completion {
        match self {
            Notification::Success(c) | Notification::Failure(c, _) => c,
        }
    }

    pub fn task(&self) -> TaskId {
        self.completion().task
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Notification::Success(_))
    }

    pub fn error(&self) -> Option<&SendError> {
        match self {
            Notification::Success(_) => None,
            Notification::Failure(_, e) => Some(e),
        }
    }
}

/// Listener that forwards notifications into an unbounded channel.
#[derive(Clone)]
pub struct ChannelListener {
    tx: Sender<Notification>,
}

impl ChannelListener {
    /// Create a listener and the receiving end of its channel.
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl CompletionListener for ChannelListener {
    fn on_success(&self, completion: Completion) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(Notification::Success(completion));
    }

    fn on_failure(&self, completion: Completion, error: SendError) {
        let _ = self.tx.send(Notification::Failure(completion, error));
    }
}

/// Serializable summary of a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub task: u64,
    pub destination: String,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl CompletionSummary {
    pub fn new(completion: &Completion, error: Option<&SendError>) -> Self {
        Self {
            task: completion.task.0,
            destination: completion.destination.to_string(),
            message_id: completion.message.message_id().map(str::to_string),
            error: error.map(ToString::to_string),
        }
    }
}

#[cfg(feature = "emitter")]
pub use emitter::EmitterListener;

#[cfg(feature = "emitter")]
mod emitter {
    use parking_lot::Mutex;

    use super::{Completion, CompletionListener, CompletionSummary};
    use crate::error::SendError;
    use crate::EventEmitter;

    /// Listener that emits [`CompletionSummary`] values on an `EventEmitter`.
    ///
    /// Successful sends are emitted as `"send.completed"`, failures as
    /// `"send.failed"`. The emitter runs its own subscribers, so the ordering
    /// guarantee ends at the `emit` call.
    pub struct EmitterListener {
        emitter: Mutex<EventEmitter>,
    }

    impl EmitterListener {
        pub const COMPLETED: &'static str = "send.completed";
        pub const FAILED: &'static str = "send.failed";

        pub fn new(emitter: EventEmitter) -> Self {
            Self {
                emitter: Mutex::new(emitter),
            }
        }
    }

    impl CompletionListener for EmitterListener {
        fn on_success(&self, completion: Completion) {
            let summary = CompletionSummary::new(&completion, None);
            self.emitter.lock().emit(Self::COMPLETED, summary);
        }

        fn on_failure(&self, completion: Completion, error: SendError) {
            let summary = CompletionSummary::new(&completion, Some(&error));
            self.emitter.lock().emit(Self::FAILED, summary);
        }
    }
}
