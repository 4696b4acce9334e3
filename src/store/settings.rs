//! Persisted system settings record

use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    core::{
        error::{StoreError, StoreResult},
        types::StationCredentials,
    },
    store::credential_store::CredentialStore,
};

pub const SETTINGS_NAMESPACE: &str = "sys_param";
pub const SETTINGS_KEY: &str = "param";

pub const DEFAULT_MQTT_URL: &str = "mqtts://broker.invalid:8883";
pub const DEFAULT_MQTT_USERNAME: &str = "menjin";
pub const DEFAULT_I2C_CLOCK: u32 = 50_000;
pub const DEFAULT_I2C_ADDRESS: u8 = 0x50;
pub const DEFAULT_RING_ADC_THRESHOLD: u32 = 1200;

/// Network and service settings, replaced only as a whole record
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsRecord {
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Channel the station network was found on, 0 when unknown
    pub wifi_channel: u8,
    pub provisioned: bool,
    pub mqtt_client_id: String,
    pub mqtt_url: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub i2c_clock: u32,
    pub i2c_address: u8,
    pub ring_adc_threshold: u32,
    /// Seconds since the epoch of the last write, 0 for pristine defaults
    pub last_update_time: u64,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_channel: 0,
            provisioned: false,
            mqtt_client_id: String::new(),
            mqtt_url: DEFAULT_MQTT_URL.into(),
            mqtt_username: DEFAULT_MQTT_USERNAME.into(),
            mqtt_password: String::new(),
            i2c_clock: DEFAULT_I2C_CLOCK,
            i2c_address: DEFAULT_I2C_ADDRESS,
            ring_adc_threshold: DEFAULT_RING_ADC_THRESHOLD,
            last_update_time: 0,
        }
    }
}

impl SettingsRecord {
    /// Station credentials, if the stored pair is usable
    pub fn station_credentials(&self) -> Option<StationCredentials> {
        StationCredentials::new(self.wifi_ssid.clone(), self.wifi_password.clone()).ok()
    }

    /// Whether boot may skip provisioning
    ///
    /// The persisted flag alone is not enough; without a usable SSID there
    /// is nothing to connect to.
    pub fn is_provisioned(&self) -> bool {
        self.station_credentials().is_some()
    }

    /// Store the station pair; `channel` is 0 when the network's channel is unknown
    pub fn set_station(&mut self, credentials: &StationCredentials, channel: u8) {
        self.wifi_ssid = credentials.ssid().to_string();
        self.wifi_password = credentials.password().to_string();
        self.wifi_channel = channel;
        self.provisioned = true;
    }

    /// Client id for the command relay, derived from `mac` when unset
    pub fn effective_client_id(&self, mac: Option<[u8; 6]>) -> String {
        if !self.mqtt_client_id.is_empty() {
            return self.mqtt_client_id.clone();
        }
        format!("menjin-{}", hex::encode(mac.unwrap_or_default()))
    }
}

impl fmt::Debug for SettingsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsRecord")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .field("wifi_channel", &self.wifi_channel)
            .field("provisioned", &self.provisioned)
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("mqtt_url", &self.mqtt_url)
            .field("mqtt_username", &self.mqtt_username)
            .field("mqtt_password", &"<redacted>")
            .field("i2c_clock", &self.i2c_clock)
            .field("i2c_address", &self.i2c_address)
            .field("ring_adc_threshold", &self.ring_adc_threshold)
            .field("last_update_time", &self.last_update_time)
            .finish()
    }
}

/// Cached settings record backed by a [`CredentialStore`]
pub struct SettingsStore {
    store: Arc<dyn CredentialStore>,
    current: RwLock<SettingsRecord>,
}

impl SettingsStore {
    /// Load the record, writing defaults on first boot
    pub async fn open(store: Arc<dyn CredentialStore>) -> StoreResult<Self> {
        let raw = {
            let store = Arc::clone(&store);
            blocking(move || store.read(SETTINGS_NAMESPACE, SETTINGS_KEY)).await?
        };

        let record = match raw {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => {
                warn!("Settings not found, writing defaults");
                let mut record = SettingsRecord::default();
                persist(&store, &mut record).await?;
                record
            }
        };

        if record.last_update_time == 0 {
            warn!("System settings not customised");
        }
        info!(settings = ?record, "Settings loaded");

        Ok(Self {
            store,
            current: RwLock::new(record),
        })
    }

    pub async fn current(&self) -> SettingsRecord {
        self.current.read().await.clone()
    }

    /// Apply `change` and persist the result
    ///
    /// The cached record is only replaced once the write succeeded.
    pub async fn update<F>(&self, change: F) -> StoreResult<SettingsRecord>
    where
        F: FnOnce(&mut SettingsRecord),
    {
        let mut current = self.current.write().await;
        let mut record = current.clone();
        change(&mut record);
        persist(&self.store, &mut record).await?;
        *current = record.clone();
        Ok(record)
    }

    /// Persist the station pair and mark the device provisioned
    pub async fn save_station(
        &self,
        credentials: &StationCredentials,
        channel: u8,
    ) -> StoreResult<SettingsRecord> {
        self.update(|record| record.set_station(credentials, channel))
            .await
    }

    /// Overwrite the record with factory defaults
    pub async fn reset_to_defaults(&self) -> StoreResult<SettingsRecord> {
        self.update(|record| *record = SettingsRecord::default()).await
    }
}

async fn persist(store: &Arc<dyn CredentialStore>, record: &mut SettingsRecord) -> StoreResult<()> {
    record.last_update_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let bytes = serde_json::to_vec(record)?;

    let store = Arc::clone(store);
    blocking(move || store.write(SETTINGS_NAMESPACE, SETTINGS_KEY, &bytes)).await?;
    info!("Settings saved");
    Ok(())
}

async fn blocking<T, F>(op: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::Unavailable(format!("storage task failed: {e}")))?
}
