//! Command-line argument parsing

use std::{net::Ipv4Addr, path::PathBuf};

use clap::Parser;

use crate::core::types::ProvisioningFlow;

#[derive(Parser, Debug, Clone)]
#[clap(name = "gateway-provisioning", version, author)]
#[clap(about = "WiFi onboarding for the access-control gateway via SmartConfig or a captive portal")]
pub struct CliArgs {
    /// Station interface name
    #[clap(short, long, default_value = "wlan0")]
    pub interface: String,

    /// Interface used for the provisioning access point
    #[clap(long, default_value = "uap0")]
    pub ap_interface: String,

    /// Flow used when the device is not provisioned (smart-config, soft-ap)
    #[clap(short, long, default_value = "soft-ap")]
    pub mode: ProvisioningFlow,

    /// Directory holding the persisted settings record
    #[clap(long, default_value = "/var/lib/gateway-provisioning")]
    pub storage_dir: PathBuf,

    /// Directory for control sockets and generated daemon configs
    #[clap(long, default_value = "/run/gateway-provisioning")]
    pub runtime_dir: PathBuf,

    /// SSID announced by the provisioning access point
    #[clap(long, default_value = "menjin")]
    pub ap_ssid: String,

    /// WPA2 passphrase of the access point, open when absent
    #[clap(long)]
    pub ap_passphrase: Option<String>,

    #[clap(long, default_value = "192.168.4.1")]
    pub ap_address: Ipv4Addr,

    /// Prefix length of the access point network
    #[clap(long, default_value = "24")]
    pub ap_prefix: u8,

    #[clap(long, default_value = "1")]
    pub ap_channel: u8,

    #[clap(long, default_value = "3")]
    pub ap_max_connections: u8,

    #[clap(long, default_value = "53")]
    pub dns_port: u16,

    #[clap(long, default_value = "80")]
    pub http_port: u16,

    /// Directory served by the portal, must contain index.html
    #[clap(long, default_value = "/usr/share/gateway-provisioning/www")]
    pub web_root: PathBuf,

    /// Delay between answering a request and restarting
    #[clap(long, default_value = "300")]
    pub restart_delay_ms: u64,

    /// Keep the configuration API running while connected
    #[clap(long)]
    pub local_api: bool,

    /// Name of the sysfs LED used as status indicator
    #[clap(long)]
    pub status_led: Option<String>,
}
