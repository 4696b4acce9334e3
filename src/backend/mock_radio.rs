//! Mock radio driver for testing

use std::{
    net::Ipv4Addr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{Mutex, broadcast};

use crate::backend::RadioDriver;
use crate::core::{
    error::{WifiError, WifiResult},
    events::PlatformEvent,
    types::{AccessPointConfig, StationCredentials, StationStorage, WifiNetwork},
};

const EVENT_CAPACITY: usize = 64;

/// Address handed out when the mock associates
pub const MOCK_STATION_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

/// Commands received by the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    StartStation,
    ConfigureStation {
        ssid: String,
        storage: StationStorage,
    },
    Connect,
    Disconnect,
    StartAccessPoint {
        ssid: String,
    },
    StopAccessPoint,
    StartSmartConfig,
    StopSmartConfig,
    Scan,
    Restore,
}

/// Internal state for the mock radio
#[derive(Debug, Default)]
struct MockState {
    calls: Vec<RadioCall>,
    scan_results: Vec<WifiNetwork>,
    station: Option<(StationCredentials, StationStorage)>,
    durable: Option<StationCredentials>,
    auto_associate: bool,
    should_fail_scan: bool,
    should_fail_configure: bool,
    should_fail_access_point: bool,
}

/// Mock radio driver for testing
///
/// Records every command and lets tests inject platform events. With
/// auto-association enabled, `connect` on a configured station immediately
/// emits `StationConnected` and `GotAddress`.
#[derive(Debug, Clone)]
pub struct MockRadio {
    inner: Arc<Mutex<MockState>>,
    events: broadcast::Sender<PlatformEvent>,
    smartconfig: Arc<AtomicBool>,
}

impl MockRadio {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MockState::default())),
            events,
            smartconfig: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Publish a platform event to all subscribers
    pub async fn emit(&self, event: PlatformEvent) {
        let _ = self.events.send(event);
    }

    pub async fn calls(&self) -> Vec<RadioCall> {
        self.inner.lock().await.calls.clone()
    }

    pub fn set_smartconfig_supported(&self, supported: bool) {
        self.smartconfig.store(supported, Ordering::SeqCst);
    }

    pub async fn set_auto_associate(&self, enabled: bool) {
        self.inner.lock().await.auto_associate = enabled;
    }

    pub async fn set_scan_results(&self, networks: Vec<WifiNetwork>) {
        self.inner.lock().await.scan_results = networks;
    }

    pub async fn set_scan_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_scan = should_fail;
    }

    pub async fn set_configure_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_configure = should_fail;
    }

    pub async fn set_access_point_failure(&self, should_fail: bool) {
        self.inner.lock().await.should_fail_access_point = should_fail;
    }

    /// Credentials kept in durable radio storage
    pub async fn durable_station(&self) -> Option<StationCredentials> {
        self.inner.lock().await.durable.clone()
    }

    /// Most recently applied station configuration
    pub async fn station(&self) -> Option<(StationCredentials, StationStorage)> {
        self.inner.lock().await.station.clone()
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDriver for MockRadio {
    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }

    async fn start_station(&self) -> WifiResult<()> {
        self.inner.lock().await.calls.push(RadioCall::StartStation);
        self.emit(PlatformEvent::StationStarted).await;
        Ok(())
    }

    async fn configure_station(
        &self,
        credentials: &StationCredentials,
        storage: StationStorage,
    ) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(RadioCall::ConfigureStation {
            ssid: credentials.ssid().to_string(),
            storage,
        });
        if state.should_fail_configure {
            return Err(WifiError::Platform {
                operation: "configure station",
                code: -1,
            });
        }
        if storage == StationStorage::Durable {
            state.durable = Some(credentials.clone());
        }
        state.station = Some((credentials.clone(), storage));
        Ok(())
    }

    async fn connect(&self) -> WifiResult<()> {
        let associate = {
            let mut state = self.inner.lock().await;
            state.calls.push(RadioCall::Connect);
            match (&state.station, state.auto_associate) {
                (Some((creds, _)), true) => Some(creds.ssid().to_string()),
                _ => None,
            }
        };

        if let Some(ssid) = associate {
            self.emit(PlatformEvent::StationConnected { ssid }).await;
            self.emit(PlatformEvent::GotAddress(MOCK_STATION_ADDRESS))
                .await;
        }
        Ok(())
    }

    async fn disconnect(&self) -> WifiResult<()> {
        self.inner.lock().await.calls.push(RadioCall::Disconnect);
        Ok(())
    }

    async fn start_access_point(&self, config: &AccessPointConfig) -> WifiResult<Ipv4Addr> {
        {
            let mut state = self.inner.lock().await;
            state.calls.push(RadioCall::StartAccessPoint {
                ssid: config.ssid.clone(),
            });
            if state.should_fail_access_point {
                return Err(WifiError::AccessPointError("Mock AP failure".into()));
            }
        }
        self.emit(PlatformEvent::AccessPointStarted).await;
        Ok(config.address)
    }

    async fn stop_access_point(&self) -> WifiResult<()> {
        self.inner.lock().await.calls.push(RadioCall::StopAccessPoint);
        Ok(())
    }

    async fn start_smartconfig(&self) -> WifiResult<()> {
        self.inner.lock().await.calls.push(RadioCall::StartSmartConfig);
        Ok(())
    }

    async fn stop_smartconfig(&self) -> WifiResult<()> {
        self.inner.lock().await.calls.push(RadioCall::StopSmartConfig);
        Ok(())
    }

    async fn scan(&self, limit: usize) -> WifiResult<Vec<WifiNetwork>> {
        let mut state = self.inner.lock().await;
        state.calls.push(RadioCall::Scan);
        if state.should_fail_scan {
            Err(WifiError::ScanFailed("Mock scan failure".into()))
        } else {
            Ok(state.scan_results.iter().take(limit).cloned().collect())
        }
    }

    async fn restore(&self) -> WifiResult<()> {
        let mut state = self.inner.lock().await;
        state.calls.push(RadioCall::Restore);
        state.durable = None;
        Ok(())
    }

    fn supports_smartconfig(&self) -> bool {
        self.smartconfig.load(Ordering::SeqCst)
    }

    fn mac_address(&self) -> Option<[u8; 6]> {
        Some([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56])
    }
}
