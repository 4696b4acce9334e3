//! Process-wide network context
//!
//! Built once in `main` and shared by `Arc` between the translator, the
//! provisioning flows, the HTTP surface and the indicator.

use std::sync::{Arc, RwLock};

use crate::{
    backend::RadioDriver,
    core::{
        gate::ServiceGate,
        session::SessionSlot,
        state::{ConnectivityMonitor, ConnectivityStateMachine},
        system::SystemControl,
        types::StationCredentials,
    },
    store::SettingsStore,
};

/// Last-known station credentials used for (re)connects
#[derive(Debug, Clone, Default)]
pub struct StationSlot {
    inner: Arc<RwLock<Option<StationCredentials>>>,
}

impl StationSlot {
    pub fn get(&self) -> Option<StationCredentials> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, credentials: StationCredentials) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(credentials);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Shared handles of the onboarding subsystem
pub struct NetworkContext<R> {
    pub radio: Arc<R>,
    pub settings: Arc<SettingsStore>,
    pub connectivity: ConnectivityMonitor,
    pub gate: ServiceGate,
    pub sessions: SessionSlot,
    pub station: StationSlot,
    pub system: SystemControl,
}

impl<R: RadioDriver> NetworkContext<R> {
    /// Build the context and hand back the single state machine writer
    pub fn new(
        radio: Arc<R>,
        settings: Arc<SettingsStore>,
        system: SystemControl,
    ) -> (Arc<Self>, ConnectivityStateMachine) {
        let gate = ServiceGate::new();
        let (machine, connectivity) = ConnectivityStateMachine::new(gate.clone());

        let ctx = Arc::new(Self {
            radio,
            settings,
            connectivity,
            gate,
            sessions: SessionSlot::new(),
            station: StationSlot::default(),
            system,
        });

        (ctx, machine)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        backend::MockRadio,
        core::system::RestartRequest,
        store::MemoryCredentialStore,
    };

    /// Context over a mock radio and in-memory storage
    pub(crate) struct Harness {
        pub ctx: Arc<NetworkContext<MockRadio>>,
        pub machine: Option<ConnectivityStateMachine>,
        pub restarts: mpsc::UnboundedReceiver<RestartRequest>,
        pub backing: Arc<MemoryCredentialStore>,
    }

    impl Harness {
        pub(crate) async fn new() -> Self {
            let backing = Arc::new(MemoryCredentialStore::new());
            let settings = Arc::new(
                SettingsStore::open(backing.clone())
                    .await
                    .expect("settings open"),
            );
            let (system, restarts) = SystemControl::new();
            let (ctx, machine) =
                NetworkContext::new(Arc::new(MockRadio::new()), settings, system);
            Self {
                ctx,
                machine: Some(machine),
                restarts,
                backing,
            }
        }

        pub(crate) fn take_machine(&mut self) -> ConnectivityStateMachine {
            self.machine.take().expect("state machine already taken")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_slot() {
        let slot = StationSlot::default();
        assert!(slot.get().is_none());

        slot.set(StationCredentials::new("Home", "secret123").unwrap());
        assert_eq!(slot.get().unwrap().ssid(), "Home");

        slot.clear();
        assert!(slot.get().is_none());
    }
}
