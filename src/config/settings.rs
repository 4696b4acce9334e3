//! Runtime settings

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::{
    config::CliArgs,
    core::types::{AccessPointConfig, ProvisioningFlow},
    provisioning::PortalConfig,
    transport::http::PortalOptions,
};

/// Upper bound of networks returned by the scan endpoint
pub const SCAN_LIMIT: usize = 10;

/// Runtime configuration settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub interface: String,
    pub ap_interface: String,
    pub mode: ProvisioningFlow,
    pub storage_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub access_point: AccessPointConfig,
    pub dns_port: u16,
    pub http_port: u16,
    pub web_root: PathBuf,
    pub restart_delay: Duration,
    pub local_api: bool,
    pub status_led: Option<String>,
}

impl From<CliArgs> for Settings {
    fn from(args: CliArgs) -> Self {
        Settings {
            interface: args.interface,
            ap_interface: args.ap_interface,
            mode: args.mode,
            storage_dir: args.storage_dir,
            runtime_dir: args.runtime_dir,
            access_point: AccessPointConfig {
                ssid: args.ap_ssid,
                // An empty passphrase means an open network
                passphrase: args.ap_passphrase.filter(|p| !p.is_empty()),
                address: args.ap_address,
                prefix_len: args.ap_prefix,
                channel: args.ap_channel,
                max_connections: args.ap_max_connections,
            },
            dns_port: args.dns_port,
            http_port: args.http_port,
            web_root: args.web_root,
            restart_delay: Duration::from_millis(args.restart_delay_ms),
            local_api: args.local_api,
            status_led: args.status_led,
        }
    }
}

impl Settings {
    /// Reject combinations the radio or the network stack would refuse
    pub fn validate(&self) -> Result<(), String> {
        let ap = &self.access_point;
        if ap.ssid.is_empty() || ap.ssid.len() > crate::core::types::MAX_SSID_LEN {
            return Err(format!("Invalid access point SSID: {:?}", ap.ssid));
        }
        if let Some(passphrase) = &ap.passphrase {
            if !(8..=63).contains(&passphrase.len()) {
                return Err("Access point passphrase must be 8 to 63 characters".into());
            }
        }
        if ap.prefix_len == 0 || ap.prefix_len > 30 {
            return Err(format!("Invalid access point prefix length: {}", ap.prefix_len));
        }
        if !(1..=13).contains(&ap.channel) {
            return Err(format!("Invalid access point channel: {}", ap.channel));
        }
        if ap.max_connections == 0 {
            return Err("Access point must accept at least one client".into());
        }
        Ok(())
    }

    pub fn portal_options(&self) -> PortalOptions {
        PortalOptions {
            web_root: self.web_root.clone(),
            restart_delay: self.restart_delay,
            scan_limit: SCAN_LIMIT,
        }
    }

    pub fn portal(&self) -> PortalConfig {
        PortalConfig {
            access_point: self.access_point.clone(),
            dns_port: self.dns_port,
            http_port: self.http_port,
            options: self.portal_options(),
        }
    }

    /// Address of the configuration API once the station is connected
    pub fn local_api_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(extra: &[&str]) -> Settings {
        let args = std::iter::once("gateway-provisioning").chain(extra.iter().copied());
        Settings::from(CliArgs::parse_from(args))
    }

    #[test]
    fn test_defaults() {
        let settings = parse(&[]);
        assert_eq!(settings.mode, ProvisioningFlow::SoftAp);
        assert_eq!(settings.access_point.ssid, "menjin");
        assert_eq!(settings.access_point.passphrase, None);
        assert_eq!(settings.access_point.address.to_string(), "192.168.4.1");
        assert_eq!(settings.restart_delay, Duration::from_millis(300));
        assert_eq!(settings.portal().options.scan_limit, 10);
        assert!(!settings.local_api);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_mode_and_passphrase() {
        let settings = parse(&["--mode", "smart-config", "--ap-passphrase", "provision"]);
        assert_eq!(settings.mode, ProvisioningFlow::SmartConfig);
        assert_eq!(settings.access_point.passphrase.as_deref(), Some("provision"));
        assert!(settings.validate().is_ok());

        let open = parse(&["--ap-passphrase", ""]);
        assert_eq!(open.access_point.passphrase, None);
    }

    #[test]
    fn test_validate_rejects_bad_access_point() {
        assert!(parse(&["--ap-passphrase", "short"]).validate().is_err());
        assert!(parse(&["--ap-channel", "14"]).validate().is_err());
        assert!(parse(&["--ap-prefix", "31"]).validate().is_err());
        assert!(parse(&["--ap-max-connections", "0"]).validate().is_err());
        assert!(parse(&["--ap-ssid", ""]).validate().is_err());
    }
}
