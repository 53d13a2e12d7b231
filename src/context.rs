//! Context - the session-like owner of a dispatch lane.
//!
//! A context owns one [`DispatchLane`] and its [`DrainBarrier`]. Producers
//! created from it share that lane, so notifications for every producer of a
//! context are ordered against each other.
//!
//! ## Lifecycle
//!
//! ```text
//! Context::new ──▶ create_producer()* ──▶ send()* ──▶ close()
//!                                         │
//!                          commit()/rollback() drain in between
//! ```
//!
//! [`DrainBarrier`]: crate::lane::DrainBarrier

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::LaneConfig;
use crate::destination::Destination;
use crate::error::{Phase, SendError, SendResult};
use crate::lane::DispatchLane;
use crate::producer::{Producer, SendTask, TaskId};
use crate::transport::Transport;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

struct ContextInner {
    id: u64,
    lane: DispatchLane,
    next_task: AtomicU64,
    closed: AtomicBool,
}

/// Shared handle to a context. Cloning is cheap; the lane stops when the last
/// handle is dropped or [`close`](Context::close) is called.
///
/// ## Example
///
/// ```ignore
/// let transport = InMemoryTransport::new();
/// let context = Context::new(Arc::new(transport.clone()))?;
///
/// let mut producer = context.create_producer()?;
/// producer.set_priority(7)?;
/// producer.send_text(&Destination::queue("orders"), "hello")?;
///
/// context.close()?;
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a context with the default lane configuration (one transport
    /// worker).
    pub fn new(transport: Arc<dyn Transport>) -> SendResult<Self> {
        Self::with_config(transport, LaneConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: LaneConfig) -> SendResult<Self> {
        config.validate()?;
        let id = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        let lane = DispatchLane::start(id, transport, &config)?;
        debug!(context = id, "context opened");
        Ok(Self {
            inner: Arc::new(ContextInner {
                id,
                lane,
                next_task: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn create_producer(&self) -> SendResult<Producer> {
        self.ensure_open()?;
        Ok(Producer::new(self.clone()))
    }

    /// Block until every task admitted so far has completed, notifications
    /// included.
    pub fn drain(&self) -> SendResult<()> {
        self.inner.lane.drain()
    }

    /// Returns `Ok(false)` if tasks were still in flight when the timeout
    /// expired.
    pub fn drain_timeout(&self, timeout: Duration) -> SendResult<bool> {
        self.inner.lane.drain_timeout(timeout)
    }

    pub fn in_flight(&self) -> u64 {
        self.inner.lane.barrier().in_flight()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Wait for outstanding sends, then stop the lane. Calling it again is a
    /// no-op.
    pub fn close(&self) -> SendResult<()> {
        self.inner.lane.ensure_not_notifier("close")?;
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.lane.drain()?;
        self.inner.lane.shutdown();
        info!(context = self.inner.id, "context closed");
        Ok(())
    }

    /// Wait for outstanding sends. No transactional work is done.
    pub fn commit(&self) -> SendResult<()> {
        self.lifecycle_drain("commit")
    }

    /// Wait for outstanding sends. No transactional work is done.
    pub fn rollback(&self) -> SendResult<()> {
        self.lifecycle_drain("rollback")
    }

    fn lifecycle_drain(&self, operation: &str) -> SendResult<()> {
        self.ensure_open()?;
        self.inner.lane.ensure_not_notifier(operation)?;
        self.inner.lane.drain()?;
        debug!(context = self.inner.id, operation, "context drained");
        Ok(())
    }

    pub(crate) fn ensure_open(&self) -> SendResult<()> {
        if self.is_closed() {
            return Err(SendError::state(format!("context {} is closed", self.inner.id)));
        }
        Ok(())
    }

    /// Pre-admission destination check: empty names and destinations the
    /// transport rejects fail here.
    pub(crate) fn check_destination(&self, destination: &Destination) -> SendResult<()> {
        if destination.is_empty() {
            return Err(SendError::InvalidDestination {
                destination: destination.to_string(),
                phase: Phase::Admission,
                reason: "destination name is empty".to_string(),
            });
        }
        self.inner
            .lane
            .transport()
            .check_destination(destination)
            .map_err(|e| SendError::InvalidDestination {
                destination: destination.to_string(),
                phase: Phase::Admission,
                reason: e.to_string(),
            })
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        TaskId(self.inner.next_task.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn submit(&self, task: SendTask) -> SendResult<()> {
        self.ensure_open()?;
        self.inner.lane.submit(task)
    }

    pub(crate) fn run_inline(&self, task: &SendTask) -> SendResult<()> {
        self.ensure_open()?;
        self.inner.lane.run_inline(task)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
