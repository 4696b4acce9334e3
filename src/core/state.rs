//! Connectivity state machine
//!
//! Three phases, no terminal state:
//!
//! ```text
//! AwaitingRadio --RadioStarted--> AwaitingAddress --AddressAcquired--> Connected
//!                                        ^                                |
//!                                        +------------LinkDown------------+
//! ```
//!
//! Every other (state, signal) pair is a no-op. The machine has exactly one
//! writer; any number of [`ConnectivityMonitor`]s observe it.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::{
    error::{ServiceError, ServiceResult},
    gate::ServiceGate,
    types::{ConnectivitySignal, ConnectivityState},
    wait::with_optional_timeout,
};

/// Pure transition table
pub fn transition(from: ConnectivityState, signal: ConnectivitySignal) -> ConnectivityState {
    use ConnectivitySignal::*;
    use ConnectivityState::*;

    match (from, signal) {
        (AwaitingRadio, RadioStarted) => AwaitingAddress,
        (AwaitingAddress, AddressAcquired) => Connected,
        (Connected, LinkDown) => AwaitingAddress,
        (state, _) => state,
    }
}

/// Writer half, owned by the event translator
#[derive(Debug)]
pub struct ConnectivityStateMachine {
    snapshot: Arc<AtomicU8>,
    tx: watch::Sender<ConnectivityState>,
    gate: ServiceGate,
}

impl ConnectivityStateMachine {
    /// Create the machine in `AwaitingRadio` along with its first monitor
    pub fn new(gate: ServiceGate) -> (Self, ConnectivityMonitor) {
        let initial = ConnectivityState::AwaitingRadio;
        let snapshot = Arc::new(AtomicU8::new(initial.into()));
        let (tx, rx) = watch::channel(initial);

        let monitor = ConnectivityMonitor {
            snapshot: Arc::clone(&snapshot),
            rx,
        };

        (Self { snapshot, tx, gate }, monitor)
    }

    /// Current state as seen by the writer
    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Apply a signal and return the resulting state
    pub fn apply(&mut self, signal: ConnectivitySignal) -> ConnectivityState {
        let from = self.state();
        let to = transition(from, signal);

        if from == to {
            debug!(?from, ?signal, "Connectivity signal ignored");
            return to;
        }

        self.snapshot.store(to.into(), Ordering::Release);
        self.tx.send_replace(to);
        info!(?from, ?to, ?signal, "Connectivity state changed");

        if to == ConnectivityState::Connected {
            self.gate.open();
        } else if from == ConnectivityState::Connected {
            self.gate.close();
        }

        to
    }
}

/// Read-only view of the connectivity state
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    snapshot: Arc<AtomicU8>,
    rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityMonitor {
    /// Latest state from the atomic snapshot
    pub fn current(&self) -> ConnectivityState {
        ConnectivityState::try_from(self.snapshot.load(Ordering::Acquire))
            .unwrap_or(ConnectivityState::AwaitingRadio)
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.rx.clone()
    }

    /// Block until the machine reaches `target`
    ///
    /// Returns immediately if it is already there. `None` waits forever.
    pub async fn wait_for(
        &self,
        target: ConnectivityState,
        timeout: Option<Duration>,
    ) -> ServiceResult<()> {
        let mut rx = self.rx.clone();
        with_optional_timeout(timeout, async move {
            rx.wait_for(|state| *state == target)
                .await
                .map(|_| ())
                .map_err(|_| ServiceError::ChannelClosed("connectivity state"))
        })
        .await
    }
}
