//! Domain types for gateway network onboarding

use std::{fmt, net::Ipv4Addr, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::core::error::{WifiError, WifiResult};

/// Maximum SSID length per IEEE 802.11
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length
pub const MAX_PASSWORD_LEN: usize = 64;

/// Represents a discovered WiFi network
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WifiNetwork {
    /// Network SSID
    pub ssid: String,
    /// MAC address (BSSID)
    pub mac: String,
    /// Channel number
    pub channel: u16,
    /// Signal strength in dBm
    pub rssi: i16,
}

/// Application connectivity phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectivityState {
    AwaitingRadio = 0,
    AwaitingAddress = 1,
    Connected = 2,
}

impl TryFrom<u8> for ConnectivityState {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0 => Ok(ConnectivityState::AwaitingRadio),
            1 => Ok(ConnectivityState::AwaitingAddress),
            2 => Ok(ConnectivityState::Connected),
            _ => Err(()),
        }
    }
}

impl From<ConnectivityState> for u8 {
    fn from(state: ConnectivityState) -> Self {
        state as u8
    }
}

/// Signals applied to the connectivity state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySignal {
    /// Station radio is up, no address yet
    RadioStarted,
    /// DHCP lease obtained on the station interface
    AddressAcquired,
    /// Association lost
    LinkDown,
}

/// Provisioning channel, selected statically and carried by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvisioningFlow {
    SmartConfig,
    SoftAp,
}

impl fmt::Display for ProvisioningFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningFlow::SmartConfig => write!(f, "smart-config"),
            ProvisioningFlow::SoftAp => write!(f, "soft-ap"),
        }
    }
}

impl FromStr for ProvisioningFlow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "smart-config" | "smartconfig" => Ok(ProvisioningFlow::SmartConfig),
            "soft-ap" | "softap" => Ok(ProvisioningFlow::SoftAp),
            other => Err(format!(
                "unknown provisioning mode '{other}', expected smart-config or soft-ap"
            )),
        }
    }
}

/// Monotonic completion flags of a provisioning session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionFlag {
    ScanComplete = 0b001,
    CredentialsReceived = 0b010,
    HandshakeAcknowledged = 0b100,
}

/// Where the radio keeps an applied station configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStorage {
    /// Lost on restart
    Volatile,
    /// Survives restart in the radio's own storage
    Durable,
}

/// Credentials for joining an access point
///
/// Constructed only through validating constructors so the 802.11 bounds
/// always hold.
#[derive(Clone, PartialEq, Eq)]
pub struct StationCredentials {
    ssid: String,
    password: String,
    bssid: Option<[u8; 6]>,
}

impl StationCredentials {
    /// Create credentials, validating SSID and password lengths
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> WifiResult<Self> {
        let ssid = ssid.into();
        let password = password.into();

        if ssid.is_empty() {
            return Err(WifiError::InvalidSsid("SSID must not be empty".into()));
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(WifiError::InvalidSsid(format!(
                "SSID is {} bytes, maximum is {MAX_SSID_LEN}",
                ssid.len()
            )));
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(WifiError::InvalidPassword(format!(
                "password is {} bytes, maximum is {MAX_PASSWORD_LEN}",
                password.len()
            )));
        }

        Ok(Self {
            ssid,
            password,
            bssid: None,
        })
    }

    /// Decode credentials from raw, possibly NUL-padded, radio buffers
    pub fn from_raw(ssid: &[u8], password: &[u8], bssid: Option<[u8; 6]>) -> WifiResult<Self> {
        let ssid = std::str::from_utf8(trim_nul(ssid))
            .map_err(|e| WifiError::InvalidSsid(format!("SSID is not UTF-8: {e}")))?;
        let password = std::str::from_utf8(trim_nul(password))
            .map_err(|e| WifiError::InvalidPassword(format!("password is not UTF-8: {e}")))?;

        Ok(Self::new(ssid, password)?.with_bssid(bssid))
    }

    /// Pin the credentials to a specific access point
    pub fn with_bssid(mut self, bssid: Option<[u8; 6]>) -> Self {
        self.bssid = bssid;
        self
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn bssid(&self) -> Option<[u8; 6]> {
        self.bssid
    }

    /// Open networks carry no passphrase
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for StationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("bssid", &self.bssid.map(format_mac))
            .finish()
    }
}

fn trim_nul(raw: &[u8]) -> &[u8] {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// Format a MAC address as colon separated hex
pub fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

/// Local access point brought up during SoftAP provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    pub ssid: String,
    /// WPA2-PSK passphrase, `None` for an open network
    pub passphrase: Option<String>,
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    pub channel: u8,
    pub max_connections: u8,
}

/// Session identifier for provisioning sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_state_u8_roundtrip() {
        for state in [
            ConnectivityState::AwaitingRadio,
            ConnectivityState::AwaitingAddress,
            ConnectivityState::Connected,
        ] {
            assert_eq!(ConnectivityState::try_from(u8::from(state)), Ok(state));
        }
        assert!(ConnectivityState::try_from(7).is_err());
    }

    #[test]
    fn test_credentials_bounds() {
        assert!(StationCredentials::new("Home", "secret123").is_ok());
        assert!(StationCredentials::new("", "secret123").is_err());
        assert!(StationCredentials::new("x".repeat(33), "").is_err());
        assert!(StationCredentials::new("x".repeat(32), "y".repeat(64)).is_ok());
        assert!(StationCredentials::new("Home", "y".repeat(65)).is_err());
    }

    #[test]
    fn test_credentials_from_raw_trims_padding() {
        let mut ssid = [0u8; 32];
        ssid[..4].copy_from_slice(b"Home");
        let mut password = [0u8; 64];
        password[..9].copy_from_slice(b"secret123");

        let creds = StationCredentials::from_raw(&ssid, &password, Some([1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(creds.ssid(), "Home");
        assert_eq!(creds.password(), "secret123");
        assert_eq!(creds.bssid(), Some([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn test_credentials_from_raw_rejects_garbage() {
        assert!(StationCredentials::from_raw(&[0xff, 0xfe], b"pw", None).is_err());
        assert!(StationCredentials::from_raw(&[0, 0, 0], b"pw", None).is_err());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = StationCredentials::new("Home", "secret123").unwrap();
        let printed = format!("{creds:?}");
        assert!(printed.contains("Home"));
        assert!(!printed.contains("secret123"));
    }

    #[test]
    fn test_provisioning_flow_parse() {
        assert_eq!("soft-ap".parse(), Ok(ProvisioningFlow::SoftAp));
        assert_eq!("SmartConfig".parse(), Ok(ProvisioningFlow::SmartConfig));
        assert!("bluetooth".parse::<ProvisioningFlow>().is_err());
    }

    #[test]
    fn test_format_mac() {
        assert_eq!(
            format_mac([0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03]),
            "aa:bb:cc:01:02:03"
        );
    }
}
