//! Radio driver capability

use std::net::Ipv4Addr;

use tokio::sync::broadcast;
use trait_variant::make;

use crate::core::{
    error::WifiResult,
    events::PlatformEvent,
    types::{AccessPointConfig, StationCredentials, StationStorage, WifiNetwork},
};

/// Abstraction over the platform WiFi stack
///
/// Commands return once the request has been accepted; their outcome is
/// reported asynchronously as [`PlatformEvent`]s on [`subscribe`].
///
/// [`subscribe`]: RadioDriver::subscribe
#[make(Send)]
pub trait RadioDriver: Sync + Send + 'static {
    /// Register for platform events
    ///
    /// Events published before the call are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent>;

    /// Bring the station interface up without joining a network
    async fn start_station(&self) -> WifiResult<()>;

    /// Apply station credentials, replacing any previous configuration
    async fn configure_station(
        &self,
        credentials: &StationCredentials,
        storage: StationStorage,
    ) -> WifiResult<()>;

    /// Join the configured network
    async fn connect(&self) -> WifiResult<()>;

    async fn disconnect(&self) -> WifiResult<()>;

    /// Bring up the local access point and return its address
    async fn start_access_point(&self, config: &AccessPointConfig) -> WifiResult<Ipv4Addr>;

    async fn stop_access_point(&self) -> WifiResult<()>;

    /// Start decoding broadcast credential frames
    async fn start_smartconfig(&self) -> WifiResult<()>;

    async fn stop_smartconfig(&self) -> WifiResult<()>;

    /// Scan for networks, returning at most `limit` entries
    async fn scan(&self, limit: usize) -> WifiResult<Vec<WifiNetwork>>;

    /// Erase the station configuration held in durable radio storage
    async fn restore(&self) -> WifiResult<()>;

    /// Whether [`start_smartconfig`] can work on this platform
    ///
    /// [`start_smartconfig`]: RadioDriver::start_smartconfig
    fn supports_smartconfig(&self) -> bool;

    /// Hardware address of the station interface
    fn mac_address(&self) -> Option<[u8; 6]>;
}
