//! Linux radio driver
//!
//! Station control goes through wpa_supplicant's control socket (wifi-ctrl),
//! the provisioning access point is a hostapd child process on a separate
//! interface, and addresses are managed with `ip`.

use std::{
    net::Ipv4Addr,
    path::{Path, PathBuf},
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, ChildStdout, Command},
    sync::broadcast,
};
use tracing::{debug, error, info, warn};
use wifi_ctrl::sta::{Broadcast, BroadcastReceiver, RequestClient, WifiSetup};

use crate::{
    backend::RadioDriver,
    core::{
        error::{WifiError, WifiResult},
        events::PlatformEvent,
        types::{
            AccessPointConfig, StationCredentials, StationStorage, WifiNetwork, format_mac,
        },
    },
};

const EVENT_CAPACITY: usize = 64;
const IP_POLL_INTERVAL: Duration = Duration::from_millis(200);
const IP_POLL_RETRIES: usize = 50; // 50 * 200ms = 10 seconds
const HOSTAPD_CONF: &str = "hostapd.conf";

pub struct WpaSupplicantRadio {
    interface: String,
    ap_interface: String,
    runtime_dir: PathBuf,
    client: RequestClient,
    events: broadcast::Sender<PlatformEvent>,
    network_id: Mutex<Option<usize>>,
    ssid: Arc<Mutex<Option<String>>>,
    hostapd: tokio::sync::Mutex<Option<Child>>,
    mac: Option<[u8; 6]>,
}

impl WpaSupplicantRadio {
    /// Attach to wpa_supplicant on `interface`
    ///
    /// Fails when the control socket cannot be set up; callers treat that
    /// as fatal.
    pub async fn new(
        interface: String,
        ap_interface: String,
        runtime_dir: PathBuf,
    ) -> WifiResult<Self> {
        let path = format!("/var/run/wpa_supplicant/{interface}");
        let mut setup =
            WifiSetup::new().map_err(|e| WifiError::WpaSupplicantError(e.to_string()))?;
        setup.set_socket_path(path);

        let client = setup.get_request_client();
        let broadcast_receiver = setup.get_broadcast_receiver();
        let station = setup.complete();

        tokio::spawn(async move {
            if let Err(e) = station.run().await {
                error!("WifiStation runtime error: {}", e);
            }
        });

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let ssid = Arc::new(Mutex::new(None));

        tokio::spawn(forward_station_events(
            broadcast_receiver,
            events.clone(),
            interface.clone(),
            Arc::clone(&ssid),
        ));

        let mac = read_mac(&interface).await;
        if mac.is_none() {
            warn!(%interface, "Could not read interface hardware address");
        }

        tokio::fs::create_dir_all(&runtime_dir)
            .await
            .map_err(|e| WifiError::InterfaceError(format!("runtime dir: {e}")))?;

        let radio = Self {
            interface,
            ap_interface,
            runtime_dir,
            client,
            events,
            network_id: Mutex::new(None),
            ssid,
            hostapd: tokio::sync::Mutex::new(None),
            mac,
        };
        radio.publish(PlatformEvent::WifiReady);
        Ok(radio)
    }

    fn publish(&self, event: PlatformEvent) {
        if self.events.send(event).is_err() {
            debug!("No radio event subscribers");
        }
    }

    async fn command(&self, cmd: String) -> WifiResult<String> {
        debug!(%cmd, "wpa_supplicant request");
        self.client
            .send_custom(cmd.clone())
            .await
            .map_err(|e| WifiError::WpaSupplicantError(format!("{cmd} failed: {e}")))
    }

    /// Convert frequency (MHz) to channel number
    fn frequency_to_channel(freq_str: &str) -> u16 {
        match freq_str.parse::<u16>().unwrap_or(0) {
            2484 => 14,
            freq @ 2412..=2472 => (freq - 2407) / 5,
            freq @ 5000..=5895 => (freq - 5000) / 5,
            _ => 0,
        }
    }
}

impl RadioDriver for WpaSupplicantRadio {
    fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }

    async fn start_station(&self) -> WifiResult<()> {
        run_ip(&["link", "set", &self.interface, "up"]).await?;

        let status = self.client.get_status().await.map_err(|e| {
            WifiError::WpaSupplicantError(format!("Failed to get status: {}", e))
        })?;
        debug!(
            wpa_state = status.get("wpa_state").map(String::as_str).unwrap_or("UNKNOWN"),
            "Station interface up"
        );

        self.publish(PlatformEvent::StationStarted);
        Ok(())
    }

    async fn configure_station(
        &self,
        credentials: &StationCredentials,
        storage: StationStorage,
    ) -> WifiResult<()> {
        debug!(ssid = credentials.ssid(), ?storage, "Configuring station");

        self.command("REMOVE_NETWORK all".into()).await?;

        let id = self.client.add_network().await.map_err(|e| {
            WifiError::WpaSupplicantError(format!("Failed to add network: {}", e))
        })?;

        // wifi-ctrl handles quoting internally via conf_escape
        self.client
            .set_network_ssid(id, credentials.ssid().to_string())
            .await
            .map_err(|e| WifiError::WpaSupplicantError(format!("Failed to set SSID: {}", e)))?;

        if credentials.is_open() {
            self.command(format!("SET_NETWORK {id} key_mgmt NONE")).await?;
        } else {
            let psk = psk_value(credentials.password());
            self.command(format!("SET_NETWORK {id} psk {psk}")).await?;
        }

        if let Some(bssid) = credentials.bssid() {
            self.command(format!("SET_NETWORK {id} bssid {}", format_mac(bssid)))
                .await?;
        }

        if storage == StationStorage::Durable {
            self.client.save_config().await.map_err(|e| {
                WifiError::WpaSupplicantError(format!("Failed to save config: {}", e))
            })?;
        }

        *self.network_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
        *self.ssid.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(credentials.ssid().to_string());
        Ok(())
    }

    async fn connect(&self) -> WifiResult<()> {
        let id = *self.network_id.lock().unwrap_or_else(|e| e.into_inner());
        match id {
            Some(id) => self
                .client
                .select_network(id)
                .await
                .map(|_| ())
                .map_err(|e| {
                    WifiError::WpaSupplicantError(format!("Failed to select network: {}", e))
                }),
            None => self.command("REASSOCIATE".into()).await.map(|_| ()),
        }
    }

    async fn disconnect(&self) -> WifiResult<()> {
        self.command("DISCONNECT".into()).await.map(|_| ())
    }

    async fn start_access_point(&self, config: &AccessPointConfig) -> WifiResult<Ipv4Addr> {
        let mut hostapd = self.hostapd.lock().await;
        if hostapd.is_some() {
            return Err(WifiError::AccessPointError("access point already running".into()));
        }

        let conf_path = self.runtime_dir.join(HOSTAPD_CONF);
        tokio::fs::write(&conf_path, hostapd_config(&self.ap_interface, config))
            .await
            .map_err(|e| WifiError::AccessPointError(format!("hostapd config: {e}")))?;

        let cidr = format!("{}/{}", config.address, config.prefix_len);
        run_ip(&["addr", "flush", "dev", &self.ap_interface]).await?;
        run_ip(&["addr", "add", &cidr, "dev", &self.ap_interface]).await?;
        run_ip(&["link", "set", &self.ap_interface, "up"]).await?;

        let mut child = Command::new("hostapd")
            .arg(&conf_path)
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WifiError::AccessPointError(format!("failed to spawn hostapd: {e}")))?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_hostapd_events(stdout, self.events.clone()));
        }
        *hostapd = Some(child);

        info!(ssid = %config.ssid, address = %config.address, "Access point started");
        self.publish(PlatformEvent::AccessPointStarted);
        Ok(config.address)
    }

    async fn stop_access_point(&self) -> WifiResult<()> {
        let Some(mut child) = self.hostapd.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = child.kill().await {
            warn!(error = %e, "Failed to stop hostapd");
        }
        run_ip(&["addr", "flush", "dev", &self.ap_interface]).await?;
        info!("Access point stopped");
        Ok(())
    }

    async fn start_smartconfig(&self) -> WifiResult<()> {
        Err(WifiError::Unsupported("SmartConfig"))
    }

    fn supports_smartconfig(&self) -> bool {
        false
    }

    async fn stop_smartconfig(&self) -> WifiResult<()> {
        Ok(())
    }

    async fn scan(&self, limit: usize) -> WifiResult<Vec<WifiNetwork>> {
        debug!("Starting WiFi scan on interface: {}", self.interface);

        let results = self
            .client
            .get_scan()
            .await
            .map_err(|e| WifiError::ScanFailed(e.to_string()))?;

        let mut networks: Vec<WifiNetwork> = results
            .iter()
            .filter(|res| !res.name.is_empty())
            .map(|res| WifiNetwork {
                ssid: res.name.clone(),
                mac: res.mac.clone(),
                channel: Self::frequency_to_channel(&res.frequency),
                rssi: res.signal as i16,
            })
            .collect();
        networks.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        networks.truncate(limit);

        debug!("Scan complete, returning {} networks", networks.len());
        Ok(networks)
    }

    async fn restore(&self) -> WifiResult<()> {
        self.command("REMOVE_NETWORK all".into()).await?;
        self.client.save_config().await.map_err(|e| {
            WifiError::WpaSupplicantError(format!("Failed to save config: {}", e))
        })?;
        *self.network_id.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    fn mac_address(&self) -> Option<[u8; 6]> {
        self.mac
    }
}

/// Map wpa_supplicant broadcasts onto platform events
async fn forward_station_events(
    mut receiver: BroadcastReceiver,
    events: broadcast::Sender<PlatformEvent>,
    interface: String,
    ssid: Arc<Mutex<Option<String>>>,
) {
    loop {
        let event = match receiver.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "wpa_supplicant broadcast receiver lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("wpa_supplicant broadcast channel closed");
                break;
            }
        };

        debug!("Received broadcast event: {:?}", event);
        let platform = match event {
            Broadcast::Connected => {
                let ssid = ssid
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
                    .unwrap_or_default();
                let _ = events.send(PlatformEvent::StationConnected { ssid });

                tokio::spawn(poll_address(interface.clone(), events.clone()));
                continue;
            }
            Broadcast::Disconnected => PlatformEvent::StationDisconnected { reason: None },
            Broadcast::WrongPsk => {
                warn!("Association rejected: wrong password");
                PlatformEvent::StationDisconnected { reason: Some(15) }
            }
            Broadcast::NetworkNotFound => {
                warn!("Configured network not found");
                PlatformEvent::StationDisconnected { reason: Some(201) }
            }
            _ => continue,
        };
        let _ = events.send(platform);
    }
}

/// DHCP runs outside wpa_supplicant, so wait for the lease to show up
async fn poll_address(interface: String, events: broadcast::Sender<PlatformEvent>) {
    for _ in 0..IP_POLL_RETRIES {
        if let Some(address) = interface_address(&interface).await {
            let _ = events.send(PlatformEvent::GotAddress(address));
            return;
        }
        tokio::time::sleep(IP_POLL_INTERVAL).await;
    }
    warn!(%interface, "Associated but no address was assigned");
}

/// Report AP client join/leave from hostapd's control output
async fn forward_hostapd_events(stdout: ChildStdout, events: broadcast::Sender<PlatformEvent>) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(event) = parse_hostapd_line(&line) {
            let _ = events.send(event);
        }
    }
    debug!("hostapd output closed");
}

fn parse_hostapd_line(line: &str) -> Option<PlatformEvent> {
    let mut parts = line.split_whitespace();
    while let Some(word) = parts.next() {
        match word {
            "AP-STA-CONNECTED" => {
                let mac = parse_mac(parts.next()?)?;
                return Some(PlatformEvent::AccessPointStationJoined { mac });
            }
            "AP-STA-DISCONNECTED" => {
                let mac = parse_mac(parts.next()?)?;
                return Some(PlatformEvent::AccessPointStationLeft { mac });
            }
            _ => {}
        }
    }
    None
}

fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let raw = hex::decode(text.trim().replace(':', "")).ok()?;
    raw.try_into().ok()
}

async fn read_mac(interface: &str) -> Option<[u8; 6]> {
    let path = Path::new("/sys/class/net").join(interface).join("address");
    let text = tokio::fs::read_to_string(path).await.ok()?;
    parse_mac(&text)
}

/// Get the IPv4 address of `interface` using the ip command
async fn interface_address(interface: &str) -> Option<Ipv4Addr> {
    let output = Command::new("ip")
        .args(["-4", "addr", "show", interface])
        .output()
        .await
        .ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_inet(&stdout)
}

fn parse_inet(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("inet "))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|cidr| cidr.split('/').next())
        .and_then(|ip| ip.parse().ok())
}

/// 64 hex digits are a raw PSK and go unquoted; anything else is a passphrase
fn psk_value(password: &str) -> String {
    if password.len() == 64 && password.bytes().all(|b| b.is_ascii_hexdigit()) {
        password.to_string()
    } else {
        format!("\"{password}\"")
    }
}

async fn run_ip(args: &[&str]) -> WifiResult<()> {
    let status = Command::new("ip")
        .args(args)
        .status()
        .await
        .map_err(|e| WifiError::InterfaceError(format!("failed to run ip: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(WifiError::Platform {
            operation: "ip",
            code: status.code().unwrap_or(-1),
        })
    }
}

fn hostapd_config(interface: &str, config: &AccessPointConfig) -> String {
    let mut conf = format!(
        "interface={interface}\n\
         driver=nl80211\n\
         ssid={}\n\
         hw_mode=g\n\
         channel={}\n\
         max_num_sta={}\n",
        config.ssid, config.channel, config.max_connections
    );

    if let Some(passphrase) = &config.passphrase {
        conf.push_str(&format!(
            "wpa=2\n\
             wpa_key_mgmt=WPA-PSK\n\
             rsn_pairwise=CCMP\n\
             wpa_passphrase={passphrase}\n"
        ));
    }
    conf
}
