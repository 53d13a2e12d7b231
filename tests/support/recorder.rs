//! A listener that records what it sees and how.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use sendlane::{Completion, CompletionListener, SendError, TaskId};

#[derive(Debug, Clone)]
pub struct Seen {
    pub task: TaskId,
    pub text: Option<String>,
    pub error: Option<SendError>,
    pub thread: ThreadId,
}

/// Records every notification, the thread it ran on, and whether two
/// notifications ever overlapped.
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<Seen>>,
    active: AtomicUsize,
    overlaps: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().clone()
    }

    pub fn tasks(&self) -> Vec<TaskId> {
        self.seen.lock().iter().map(|s| s.task).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn record(&self, completion: Completion, error: Option<SendError>) {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        // Widen the window in which an overlap would be caught.
        thread::sleep(Duration::from_micros(200));
        self.seen.lock().push(Seen {
            task: completion.task,
            text: completion.message.text_body().map(str::to_string),
            error,
            thread: thread::current().id(),
        });
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CompletionListener for Recorder {
    fn on_success(&self, completion: Completion) {
        self.record(completion, None);
    }

    fn on_failure(&self, completion: Completion, error: SendError) {
        self.record(completion, Some(error));
    }
}
