//! Platform events and their translation into connectivity signals

use std::{net::Ipv4Addr, sync::Arc};

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    backend::RadioDriver,
    core::{
        context::NetworkContext,
        state::ConnectivityStateMachine,
        types::{ConnectivitySignal, ConnectivityState, SessionFlag, format_mac},
    },
};

/// Raw events published by a radio driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Driver finished initialisation
    WifiReady,
    /// Station interface is up, not yet associated
    StationStarted,
    StationConnected { ssid: String },
    /// Association lost, with the platform reason code when known
    StationDisconnected { reason: Option<u16> },
    /// DHCP lease obtained on the station interface
    GotAddress(Ipv4Addr),
    AccessPointStarted,
    AccessPointStationJoined { mac: [u8; 6] },
    AccessPointStationLeft { mac: [u8; 6] },
    SmartConfig(SmartConfigEvent),
}

/// Lifecycle events of the broadcast credential decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmartConfigEvent {
    ScanDone,
    FoundChannel(u8),
    /// Raw, unvalidated credential frame
    GotCredentials {
        ssid: Vec<u8>,
        password: Vec<u8>,
        bssid: Option<[u8; 6]>,
    },
    /// The sending phone acknowledged the handshake
    AckDone,
}

/// Sole writer of the connectivity state
///
/// Subscribes to the radio when constructed, so it must be created before
/// the radio is started.
pub struct EventTranslator<R> {
    ctx: Arc<NetworkContext<R>>,
    machine: ConnectivityStateMachine,
    rx: broadcast::Receiver<PlatformEvent>,
}

impl<R: RadioDriver> EventTranslator<R> {
    pub fn new(ctx: Arc<NetworkContext<R>>, machine: ConnectivityStateMachine) -> Self {
        let rx = ctx.radio.subscribe();
        Self { ctx, machine, rx }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process events in arrival order until the radio goes away
    pub async fn run(mut self) {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    self.handle(event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event translator lagged behind radio events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Radio event channel closed, translator exiting");
                    break;
                }
            }
        }
    }

    /// Translate one event, returning the new state if a signal was applied
    pub async fn handle(&mut self, event: PlatformEvent) -> Option<ConnectivityState> {
        match event {
            PlatformEvent::WifiReady => {
                debug!("Radio ready");
                None
            }
            PlatformEvent::StationStarted => {
                let state = self.machine.apply(ConnectivitySignal::RadioStarted);
                self.reconnect().await;
                Some(state)
            }
            PlatformEvent::StationConnected { ssid } => {
                info!(%ssid, "Associated with access point");
                None
            }
            PlatformEvent::StationDisconnected { reason } => {
                info!(?reason, "Station disconnected");
                let state = self.machine.apply(ConnectivitySignal::LinkDown);
                self.reconnect().await;
                Some(state)
            }
            PlatformEvent::GotAddress(address) => {
                info!(%address, "Station address acquired");
                Some(self.machine.apply(ConnectivitySignal::AddressAcquired))
            }
            PlatformEvent::AccessPointStarted => {
                debug!("Access point started");
                None
            }
            PlatformEvent::AccessPointStationJoined { mac } => {
                info!(mac = %format_mac(mac), "Client joined access point");
                None
            }
            PlatformEvent::AccessPointStationLeft { mac } => {
                info!(mac = %format_mac(mac), "Client left access point");
                None
            }
            PlatformEvent::SmartConfig(event) => {
                self.dispatch_smartconfig(event);
                None
            }
        }
    }

    async fn reconnect(&self) {
        if self.ctx.station.get().is_none() {
            return;
        }
        if let Err(e) = self.ctx.radio.connect().await {
            warn!(error = %e, "Station connect failed");
        }
    }

    fn dispatch_smartconfig(&self, event: SmartConfigEvent) {
        let Some(session) = self.ctx.sessions.current() else {
            debug!(?event, "SmartConfig event without active session");
            return;
        };

        let flag = match &event {
            SmartConfigEvent::ScanDone => Some(SessionFlag::ScanComplete),
            SmartConfigEvent::FoundChannel(_) => None,
            SmartConfigEvent::GotCredentials { .. } => Some(SessionFlag::CredentialsReceived),
            SmartConfigEvent::AckDone => Some(SessionFlag::HandshakeAcknowledged),
        };

        if let Some(flag) = flag {
            let newly_set = session.mark(flag);
            if flag == SessionFlag::HandshakeAcknowledged && !newly_set {
                debug!(session = %session.id(), "Duplicate handshake acknowledgement ignored");
                return;
            }
        }

        if !session.forward(event) {
            debug!(session = %session.id(), "SmartConfig event not consumed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{MockRadio, mock_radio::RadioCall},
        core::{
            context::testing::Harness,
            types::{ProvisioningFlow, StationCredentials},
        },
    };
    use tokio::sync::mpsc;

    async fn translator() -> (EventTranslator<MockRadio>, Arc<NetworkContext<MockRadio>>) {
        let mut harness = Harness::new().await;
        let machine = harness.take_machine();
        let ctx = Arc::clone(&harness.ctx);
        (EventTranslator::new(Arc::clone(&ctx), machine), ctx)
    }

    #[tokio::test]
    async fn test_platform_events_drive_state() {
        let (mut translator, ctx) = translator().await;

        assert_eq!(
            translator.handle(PlatformEvent::GotAddress(Ipv4Addr::new(10, 0, 0, 2))).await,
            Some(ConnectivityState::AwaitingRadio)
        );
        assert_eq!(
            translator.handle(PlatformEvent::StationStarted).await,
            Some(ConnectivityState::AwaitingAddress)
        );
        assert_eq!(
            translator.handle(PlatformEvent::GotAddress(Ipv4Addr::new(10, 0, 0, 2))).await,
            Some(ConnectivityState::Connected)
        );
        assert_eq!(
            translator
                .handle(PlatformEvent::StationDisconnected { reason: Some(8) })
                .await,
            Some(ConnectivityState::AwaitingAddress)
        );
        assert_eq!(ctx.connectivity.current(), ConnectivityState::AwaitingAddress);
    }

    #[tokio::test]
    async fn test_disconnect_reconnects_with_known_credentials() {
        let (mut translator, ctx) = translator().await;

        translator
            .handle(PlatformEvent::StationDisconnected { reason: None })
            .await;
        assert!(!ctx.radio.calls().await.contains(&RadioCall::Connect));

        ctx.station
            .set(StationCredentials::new("Home", "secret123").unwrap());
        translator
            .handle(PlatformEvent::StationDisconnected { reason: None })
            .await;
        assert_eq!(
            ctx.radio
                .calls()
                .await
                .iter()
                .filter(|c| **c == RadioCall::Connect)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_ack_forwarded_once() {
        let (mut translator, ctx) = translator().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = ctx
            .sessions
            .open(ProvisioningFlow::SmartConfig, Some(tx))
            .unwrap();

        translator
            .handle(PlatformEvent::SmartConfig(SmartConfigEvent::ScanDone))
            .await;
        translator
            .handle(PlatformEvent::SmartConfig(SmartConfigEvent::AckDone))
            .await;
        translator
            .handle(PlatformEvent::SmartConfig(SmartConfigEvent::AckDone))
            .await;

        assert!(guard.session().is_set(SessionFlag::ScanComplete));
        assert!(guard.session().is_set(SessionFlag::HandshakeAcknowledged));
        assert_eq!(rx.recv().await, Some(SmartConfigEvent::ScanDone));
        assert_eq!(rx.recv().await, Some(SmartConfigEvent::AckDone));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_consumes_radio_events() {
        let (translator, ctx) = translator().await;
        let handle = translator.spawn();

        ctx.radio.emit(PlatformEvent::StationStarted).await;
        ctx.radio
            .emit(PlatformEvent::GotAddress(Ipv4Addr::new(192, 168, 1, 20)))
            .await;

        ctx.connectivity
            .wait_for(ConnectivityState::Connected, Some(std::time::Duration::from_secs(1)))
            .await
            .unwrap();
        handle.abort();
    }
}
