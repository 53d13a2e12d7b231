//! In-flight tracking for a context's sends.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Counts {
    /// Admitted tasks that have not yet returned (sync) or notified (async).
    in_flight: u64,
    /// Async tasks whose transport work has not finished.
    unexecuted: u64,
}

/// Counts in-flight tasks and lets lifecycle operations wait for quiescence.
///
/// Counters never go below zero; releasing more than was admitted is a bug in
/// the lane and is clamped with a logged error.
#[derive(Debug, Default)]
pub struct DrainBarrier {
    counts: Mutex<Counts>,
    idle: Condvar,
    executed: Condvar,
}

impl DrainBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task entered the lane. `needs_execution` is true for async tasks
    /// whose transport work will run on a worker.
    pub fn admit(&self, needs_execution: bool) {
        let mut counts = self.counts.lock();
        counts.in_flight += 1;
        if needs_execution {
            counts.unexecuted += 1;
        }
    }

    /// An async task's transport work finished.
    pub fn executed(&self) {
        let mut counts = self.counts.lock();
        match counts.unexecuted.checked_sub(1) {
            Some(n) => counts.unexecuted = n,
            None => tracing::error!("drain barrier: executed() without pending execution"),
        }
        if counts.unexecuted == 0 {
            self.executed.notify_all();
        }
    }

    /// A task finished completely (notification delivered or sync return).
    pub fn complete(&self) {
        let mut counts = self.counts.lock();
        match counts.in_flight.checked_sub(1) {
            Some(n) => counts.in_flight = n,
            None => tracing::error!("drain barrier: complete() without in-flight task"),
        }
        if counts.in_flight == 0 {
            self.idle.notify_all();
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.counts.lock().in_flight
    }

    pub fn unexecuted(&self) -> u64 {
        self.counts.lock().unexecuted
    }

    /// Block until nothing is in flight.
    pub fn wait_idle(&self) {
        let mut counts = self.counts.lock();
        while counts.in_flight > 0 {
            self.idle.wait(&mut counts);
        }
    }

    /// Block until nothing is in flight or the timeout passes. Returns true
    /// when the barrier reached zero.
    ///
    /// Timeouts too large to express as a deadline wait without bound.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait_idle();
            return true;
        };
        let mut counts = self.counts.lock();
        while counts.in_flight > 0 {
            if self.idle.wait_until(&mut counts, deadline).timed_out() {
                return counts.in_flight == 0;
            }
        }
        true
    }

    /// Block until every async task admitted so far has finished its
    /// transport work.
    pub fn wait_executed(&self) {
        let mut counts = self.counts.lock();
        while counts.unexecuted > 0 {
            self.executed.wait(&mut counts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn idle_when_empty() {
        let barrier = DrainBarrier::new();
        barrier.wait_idle();
        assert!(barrier.wait_idle_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn counts_admitted_and_completed() {
        let barrier = DrainBarrier::new();
        barrier.admit(true);
        barrier.admit(false);
        assert_eq!(barrier.in_flight(), 2);
        assert_eq!(barrier.unexecuted(), 1);

        barrier.executed();
        barrier.complete();
        barrier.complete();
        assert_eq!(barrier.in_flight(), 0);
        assert_eq!(barrier.unexecuted(), 0);
    }

    #[test]
    fn never_negative() {
        let barrier = DrainBarrier::new();
        barrier.complete();
        barrier.executed();
        assert_eq!(barrier.in_flight(), 0);
        assert_eq!(barrier.unexecuted(), 0);
    }

    #[test]
    fn timeout_reports_pending_work() {
        let barrier = DrainBarrier::new();
        barrier.admit(true);
        assert!(!barrier.wait_idle_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn wait_idle_unblocks_on_complete() {
        let barrier = Arc::new(DrainBarrier::new());
        barrier.admit(true);

        let b = barrier.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            b.executed();
            b.complete();
        });

        barrier.wait_executed();
        barrier.wait_idle();
        assert_eq!(barrier.in_flight(), 0);
        handle.join().unwrap();
    }

    #[test]
    fn unbounded_timeout_waits_for_idle() {
        let barrier = Arc::new(DrainBarrier::new());
        barrier.admit(false);

        let releaser = {
            let barrier = barrier.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                barrier.complete();
            })
        };

        assert!(barrier.wait_idle_timeout(Duration::MAX));
        assert_eq!(barrier.in_flight(), 0);
        releaser.join().unwrap();
    }
}
