//! Response message types

use serde::{Deserialize, Serialize};

use crate::{core::types::WifiNetwork, store::SettingsRecord};

/// Body of `GET /api/config`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigResponse {
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub wifi_channel: u8,
    pub mqtt_client_id: String,
    pub mqtt_url: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
    pub i2c_clock: u32,
    pub i2c_address: u8,
    pub ring_adc_threshold: u32,
}

impl From<SettingsRecord> for ConfigResponse {
    fn from(record: SettingsRecord) -> Self {
        Self {
            wifi_ssid: record.wifi_ssid,
            wifi_password: record.wifi_password,
            wifi_channel: record.wifi_channel,
            mqtt_client_id: record.mqtt_client_id,
            mqtt_url: record.mqtt_url,
            mqtt_username: record.mqtt_username,
            mqtt_password: record.mqtt_password,
            i2c_clock: record.i2c_clock,
            i2c_address: record.i2c_address,
            ring_adc_threshold: record.ring_adc_threshold,
        }
    }
}

/// One element of the `GET /api/scan` array
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String,
    pub rssi: i16,
}

impl From<WifiNetwork> for ScanEntry {
    fn from(network: WifiNetwork) -> Self {
        Self {
            ssid: network.ssid,
            rssi: network.rssi,
        }
    }
}
