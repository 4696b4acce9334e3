//! Network-ready gate for dependent services
//!
//! The connectivity state machine opens the gate on every entry into
//! `Connected` and closes it on every exit. Dependent subsystems (command
//! relay, local configuration API) hold a [`GateListener`] and must not touch
//! the network before their first [`GateSignal::Start`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::broadcast;
use tracing::{debug, warn};

const GATE_CHANNEL_CAPACITY: usize = 16;

/// Start/stop signal delivered to dependent services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    Start,
    Stop,
}

/// Broadcast gate shared through the network context
#[derive(Debug, Clone)]
pub struct ServiceGate {
    tx: broadcast::Sender<GateSignal>,
    open: Arc<AtomicBool>,
}

impl ServiceGate {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(GATE_CHANNEL_CAPACITY);
        Self {
            tx,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether dependent services may currently use the network
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Register a new consumer
    ///
    /// A listener created while the gate is already open observes a `Start`
    /// as its first signal.
    pub fn subscribe(&self) -> GateListener {
        let rx = self.tx.subscribe();
        let pending_start = self.is_open();
        GateListener {
            rx,
            open: Arc::clone(&self.open),
            pending_start,
            last: None,
        }
    }

    pub(crate) fn open(&self) {
        self.open.store(true, Ordering::Release);
        self.send(GateSignal::Start);
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.send(GateSignal::Stop);
    }

    fn send(&self, signal: GateSignal) {
        // No receivers is fine, late subscribers read the flag
        if self.tx.send(signal).is_err() {
            debug!(?signal, "No gate listeners registered");
        }
    }
}

impl Default for ServiceGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of the gate held by one dependent service
#[derive(Debug)]
pub struct GateListener {
    rx: broadcast::Receiver<GateSignal>,
    open: Arc<AtomicBool>,
    pending_start: bool,
    last: Option<GateSignal>,
}

impl GateListener {
    /// Wait for the next state change
    ///
    /// Consecutive identical signals are collapsed. Returns `None` once the
    /// gate has been dropped.
    pub async fn next(&mut self) -> Option<GateSignal> {
        if std::mem::take(&mut self.pending_start) {
            self.last = Some(GateSignal::Start);
            return Some(GateSignal::Start);
        }

        loop {
            let signal = match self.rx.recv().await {
                Ok(signal) => signal,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Gate listener lagged, resyncing from current state");
                    if self.open.load(Ordering::Acquire) {
                        GateSignal::Start
                    } else {
                        GateSignal::Stop
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            if self.last == Some(signal) {
                continue;
            }
            // A leading Stop carries no information for a fresh listener
            if self.last.is_none() && signal == GateSignal::Stop {
                self.last = Some(signal);
                continue;
            }

            self.last = Some(signal);
            return Some(signal);
        }
    }
}
