//! Transports with scripted behaviour.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use sendlane::{Delivery, Destination, Message, Transport, TransportError};

use super::{FAIL, LATENCY_MS, VANISH};

/// Transport driven by message properties.
///
/// - `latency_ms` (long): sleep before accepting
/// - `fail` (bool): reject the message
/// - `vanish` (bool): report the destination as unknown
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    log: Arc<Mutex<Vec<Delivery>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.log.lock().clone()
    }

    /// Text bodies in the order they were accepted.
    pub fn texts(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter_map(|d| d.message.text_body().map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    /// Highest number of `deliver` calls observed running at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn deliver(&self, destination: &Destination, message: &Message) -> Result<(), TransportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let props = message.properties();
        let latency = props.get(LATENCY_MS).and_then(|v| v.as_long().ok()).unwrap_or(0);
        if latency > 0 {
            thread::sleep(Duration::from_millis(latency as u64));
        }

        let result = if props.get_bool(VANISH).unwrap_or(false) {
            Err(TransportError::UnknownDestination(destination.to_string()))
        } else if props.get_bool(FAIL).unwrap_or(false) {
            Err(TransportError::Rejected("scripted failure".into()))
        } else {
            self.log.lock().push(Delivery {
                destination: destination.clone(),
                message: message.clone(),
            });
            Ok(())
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Transport that holds every delivery until the test releases it.
pub struct GatedTransport {
    entered: Sender<()>,
    gate: Receiver<()>,
    log: Mutex<Vec<Message>>,
}

/// Test-side controls for a [`GatedTransport`].
pub struct Gate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl GatedTransport {
    pub fn new() -> (Arc<Self>, Gate) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let transport = Arc::new(Self {
            entered: entered_tx,
            gate: release_rx,
            log: Mutex::new(Vec::new()),
        });
        (
            transport,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log.lock().clone()
    }
}

impl Gate {
    /// Wait until a delivery is blocked on the gate.
    pub fn wait_entered(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("no delivery reached the gate");
    }

    pub fn release(&self) {
        self.release.send(()).unwrap();
    }
}

impl Transport for GatedTransport {
    fn deliver(&self, _destination: &Destination, message: &Message) -> Result<(), TransportError> {
        let _ = self.entered.send(());
        self.gate
            .recv()
            .map_err(|_| TransportError::Unavailable("gate dropped".into()))?;
        self.log.lock().push(message.clone());
        Ok(())
    }
}
