//! Request message types

use serde::{Deserialize, Serialize};

use crate::{core::types::StationCredentials, store::SettingsRecord};

/// Body of `POST /api/config`
///
/// Every field is optional. Service fields present in the request replace
/// the stored ones; the WiFi pair is required and accepted only as a whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigRequest {
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    pub mqtt_client_id: Option<String>,
    pub mqtt_url: Option<String>,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub i2c_clock: Option<u32>,
    pub i2c_address: Option<u8>,
    pub ring_adc_threshold: Option<u32>,
}

impl ConfigRequest {
    /// Validate the submitted WiFi pair
    pub fn station_credentials(&self) -> Result<StationCredentials, String> {
        let ssid = self.wifi_ssid.as_deref().unwrap_or_default();
        if ssid.is_empty() {
            return Err("Missing parameter: wifi_ssid is required".into());
        }

        StationCredentials::new(ssid, self.wifi_password.as_deref().unwrap_or_default())
            .map_err(|e| e.to_string())
    }

    /// Copy the submitted service fields into `record`
    pub fn apply_service_fields(&self, record: &mut SettingsRecord) {
        if let Some(value) = &self.mqtt_client_id {
            record.mqtt_client_id = value.clone();
        }
        if let Some(value) = &self.mqtt_url {
            record.mqtt_url = value.clone();
        }
        if let Some(value) = &self.mqtt_username {
            record.mqtt_username = value.clone();
        }
        if let Some(value) = &self.mqtt_password {
            record.mqtt_password = value.clone();
        }
        if let Some(value) = self.i2c_clock {
            record.i2c_clock = value;
        }
        if let Some(value) = self.i2c_address {
            record.i2c_address = value;
        }
        if let Some(value) = self.ring_adc_threshold {
            record.ring_adc_threshold = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_ssid_rejected() {
        let request: ConfigRequest = serde_json::from_str(r#"{"wifi_password":"x"}"#).unwrap();
        assert!(request.station_credentials().unwrap_err().contains("wifi_ssid"));

        let request: ConfigRequest = serde_json::from_str(r#"{"wifi_ssid":""}"#).unwrap();
        assert!(request.station_credentials().is_err());
    }

    #[test]
    fn test_oversize_password_rejected() {
        let request = ConfigRequest {
            wifi_ssid: Some("Home".into()),
            wifi_password: Some("p".repeat(65)),
            ..Default::default()
        };
        assert!(request.station_credentials().is_err());
    }

    #[test]
    fn test_partial_service_update() {
        let request: ConfigRequest =
            serde_json::from_str(r#"{"wifi_ssid":"Home","mqtt_username":"door","i2c_clock":100000}"#)
                .unwrap();
        let mut record = SettingsRecord::default();
        let before = record.clone();

        request.apply_service_fields(&mut record);

        assert_eq!(record.mqtt_username, "door");
        assert_eq!(record.i2c_clock, 100_000);
        assert_eq!(record.mqtt_url, before.mqtt_url);
        assert_eq!(record.ring_adc_threshold, before.ring_adc_threshold);
    }
}
