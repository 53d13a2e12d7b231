//! Dispatch Lane - executes send tasks and delivers their notifications in order.
//!
//! Each context owns one lane:
//!
//! ```text
//!  submit(task) ──seq──▶ jobs ──▶ worker 1..N ──transport.deliver()──┐
//!                                                                     ▼
//!                        listener ◀── notifier (reorder buffer) ◀── outcomes
//! ```
//!
//! - Sequence numbers are assigned under the submission lock, so they follow
//!   the order `send` was called in.
//! - Workers may finish out of order; the notifier holds outcomes until every
//!   lower sequence number has been delivered.
//! - The notifier is a single thread: notifications never overlap and never
//!   run on the thread that called `send`.
//! - Synchronous sends run inline on the caller's thread via [`DispatchLane::run_inline`].

mod barrier;
mod reorder;

pub use barrier::DrainBarrier;
pub use reorder::ReorderBuffer;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::config::LaneConfig;
use crate::error::{Phase, SendError, SendResult};
use crate::listener::Completion;
use crate::producer::{SendTask, TaskState};
use crate::transport::Transport;

struct Job {
    seq: u64,
    task: SendTask,
}

struct Outcome {
    seq: u64,
    task: SendTask,
    result: SendResult<()>,
}

struct Submission {
    next_seq: u64,
    jobs: Option<Sender<Job>>,
}

/// The execution and ordering engine for one context.
pub struct DispatchLane {
    context: u64,
    transport: Arc<dyn Transport>,
    barrier: Arc<DrainBarrier>,
    submission: Mutex<Submission>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    notifier: ThreadId,
}

impl DispatchLane {
    /// Spawn the notifier and worker threads.
    pub fn start(context: u64, transport: Arc<dyn Transport>, config: &LaneConfig) -> SendResult<Self> {
        config.validate()?;

        let barrier = Arc::new(DrainBarrier::new());
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<Job>();
        let (outcomes_tx, outcomes_rx) = crossbeam_channel::unbounded::<Outcome>();

        let mut threads = Vec::with_capacity(config.transport_workers + 1);

        let notifier = {
            let barrier = barrier.clone();
            spawn_named(format!("{}-notify-{}", config.thread_name, context), move || {
                run_notifier(context, outcomes_rx, barrier)
            })?
        };
        let notifier_id = notifier.thread().id();
        threads.push(notifier);

        for worker in 0..config.transport_workers {
            let jobs = jobs_rx.clone();
            let outcomes = outcomes_tx.clone();
            let transport = transport.clone();
            let barrier = barrier.clone();
            let name = format!("{}-worker-{}-{}", config.thread_name, context, worker);
            match spawn_named(name, move || run_worker(jobs, outcomes, transport, barrier)) {
                Ok(handle) => threads.push(handle),
                Err(e) => {
                    // Closing the channels lets the threads already started exit.
                    drop(jobs_tx);
                    drop(outcomes_tx);
                    for handle in threads {
                        let _ = handle.join();
                    }
                    return Err(e);
                }
            }
        }

        debug!(context, workers = config.transport_workers, "dispatch lane started");

        Ok(Self {
            context,
            transport,
            barrier,
            submission: Mutex::new(Submission {
                next_seq: 0,
                jobs: Some(jobs_tx),
            }),
            threads: Mutex::new(threads),
            notifier: notifier_id,
        })
    }

    pub fn barrier(&self) -> &DrainBarrier {
        &self.barrier
    }

    pub fn transport(&self) -> &dyn Transport {
        &*self.transport
    }

    /// True when called from this lane's notifier thread, i.e. from inside a
    /// completion listener of this context.
    pub fn is_notifier_thread(&self) -> bool {
        thread::current().id() == self.notifier
    }

    /// Admit an asynchronous task. Its notification fires later on the
    /// notifier thread.
    pub fn submit(&self, task: SendTask) -> SendResult<()> {
        let mut submission = self.submission.lock();
        let seq = submission.next_seq;
        let id = task.id;
        let jobs = submission
            .jobs
            .as_ref()
            .ok_or_else(|| SendError::state("dispatch lane is shut down"))?;

        self.barrier.admit(true);
        if jobs.send(Job { seq, task }).is_err() {
            self.barrier.executed();
            self.barrier.complete();
            return Err(SendError::state("dispatch lane workers have stopped"));
        }
        submission.next_seq += 1;

        trace!(context = self.context, task = %id, seq, state = ?TaskState::Submitted, "task submitted");
        Ok(())
    }

    /// Run a synchronous task on the caller's thread.
    ///
    /// Waits until every earlier asynchronous task has finished its transport
    /// work so the transport sees sends in call order.
    pub fn run_inline(&self, task: &SendTask) -> SendResult<()> {
        self.barrier.admit(false);
        self.barrier.wait_executed();
        trace!(context = self.context, task = %task.id, state = ?TaskState::Executing, "executing inline");
        let result = execute(&*self.transport, task);
        self.barrier.complete();
        result
    }

    /// Block until every admitted task has completed, notifications included.
    pub fn drain(&self) -> SendResult<()> {
        self.ensure_not_notifier("drain")?;
        self.barrier.wait_idle();
        Ok(())
    }

    /// Like [`drain`](Self::drain) with an upper bound. Returns whether the
    /// lane went idle in time.
    pub fn drain_timeout(&self, timeout: Duration) -> SendResult<bool> {
        self.ensure_not_notifier("drain")?;
        Ok(self.barrier.wait_idle_timeout(timeout))
    }

    pub(crate) fn ensure_not_notifier(&self, operation: &str) -> SendResult<()> {
        if self.is_notifier_thread() {
            return Err(SendError::state(format!(
                "{} called from a completion listener of the same context",
                operation
            )));
        }
        Ok(())
    }

    /// Stop accepting tasks and wait for the lane threads to finish what was
    /// already submitted. A lane thread calling this skips joining itself.
    pub fn shutdown(&self) {
        let jobs = self.submission.lock().jobs.take();
        if jobs.is_none() {
            return;
        }
        drop(jobs);

        let handles = std::mem::take(&mut *self.threads.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!(context = self.context, "dispatch lane thread panicked");
            }
        }
        debug!(context = self.context, "dispatch lane stopped");
    }
}

impl Drop for DispatchLane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_named<F>(name: String, f: F) -> SendResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .spawn(f)
        .map_err(|e| SendError::state(format!("failed to start dispatch lane thread: {}", e)))
}

/// Run transport work for one task, turning errors and panics into a
/// [`SendError`] with task context.
pub(crate) fn execute(transport: &dyn Transport, task: &SendTask) -> SendResult<()> {
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
        transport.deliver(&task.destination, &task.message)
    }));
    match delivered {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into_send_error(
            task.id,
            &task.destination.to_string(),
            Phase::Execution,
        )),
        Err(_) => Err(SendError::Transport {
            task: task.id,
            destination: task.destination.to_string(),
            reason: "transport panicked".to_string(),
        }),
    }
}

fn run_worker(
    jobs: Receiver<Job>,
    outcomes: Sender<Outcome>,
    transport: Arc<dyn Transport>,
    barrier: Arc<DrainBarrier>,
) {
    for Job { seq, task } in jobs.iter() {
        trace!(task = %task.id, seq, state = ?TaskState::Executing, "executing");
        let result = execute(&*transport, &task);
        if let Err(e) = &result {
            warn!(task = %task.id, destination = %task.destination, error = %e, "async send failed");
        }
        barrier.executed();
        if outcomes.send(Outcome { seq, task, result }).is_err() {
            error!(seq, "notifier stopped; dropping outcome");
            barrier.complete();
        }
    }
}

fn run_notifier(context: u64, outcomes: Receiver<Outcome>, barrier: Arc<DrainBarrier>) {
    let mut buffer = ReorderBuffer::new();
    for outcome in outcomes.iter() {
        let seq = outcome.seq;
        if !buffer.insert(seq, outcome) {
            error!(context, seq, "duplicate sequence number; outcome dropped");
            barrier.complete();
            continue;
        }
        while let Some(ready) = buffer.pop_ready() {
            notify(ready);
            barrier.complete();
        }
    }
    if buffer.held() > 0 {
        warn!(context, held = buffer.held(), "notifier stopped with undelivered outcomes");
    }
}

fn notify(outcome: Outcome) {
    let Outcome { seq, task, result } = outcome;
    let SendTask {
        id,
        destination,
        message,
        listener,
        ..
    } = task;

    let Some(listener) = listener else {
        error!(task = %id, seq, "async task without a completion listener");
        return;
    };

    let delivered = panic::catch_unwind(AssertUnwindSafe(|| match result {
        Ok(()) => {
            trace!(task = %id, seq, state = ?TaskState::Completed, "notifying success");
            listener.on_success(Completion {
                task: id,
                destination,
                message,
                state: TaskState::Completed,
            })
        }
        Err(error) => {
            trace!(task = %id, seq, state = ?TaskState::Failed, "notifying failure");
            listener.on_failure(
                Completion {
                    task: id,
                    destination,
                    message,
                    state: TaskState::Failed,
                },
                error,
            )
        }
    }));

    if delivered.is_err() {
        error!(task = %id, seq, "completion listener panicked");
    }
}
