//! Access-point provisioning behind a captive portal

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use tracing::{info, warn};

use crate::{
    backend::RadioDriver,
    core::{
        context::NetworkContext,
        error::ServiceResult,
        system::RestartReason,
        types::{AccessPointConfig, ConnectivityState, ProvisioningFlow, SessionFlag},
        wait::with_optional_timeout,
    },
    transport::{
        dns::{CaptiveDnsRedirector, RedirectRule},
        http::{Portal, PortalOptions, PortalServer},
    },
};

/// Everything the captive portal needs to come up
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub access_point: AccessPointConfig,
    pub dns_port: u16,
    pub http_port: u16,
    pub options: PortalOptions,
}

/// Serve the portal until credentials are accepted or the station
/// connects, then tear it down and schedule a restart
pub async fn run<R: RadioDriver>(
    ctx: &Arc<NetworkContext<R>>,
    config: &PortalConfig,
    timeout: Option<Duration>,
) -> ServiceResult<()> {
    let guard = ctx.sessions.open(ProvisioningFlow::SoftAp, None)?;

    let address = ctx.radio.start_access_point(&config.access_point).await?;
    info!(ssid = %config.access_point.ssid, %address, "Access point up");

    let servers = async {
        ctx.radio.start_station().await?;

        let dns = CaptiveDnsRedirector::bind(
            SocketAddr::new(IpAddr::V4(address), config.dns_port),
            vec![RedirectRule::wildcard(address)],
        )
        .await?;
        let portal = Portal::new(Arc::clone(ctx), config.options.clone())
            .with_session(Arc::clone(guard.session()));
        let http =
            PortalServer::start(portal, SocketAddr::new(IpAddr::V4(address), config.http_port))?;
        ServiceResult::Ok((dns.spawn(), http))
    }
    .await;

    let (dns, http) = match servers {
        Ok(servers) => servers,
        Err(e) => {
            stop_access_point(ctx).await;
            return Err(e);
        }
    };
    info!(http = %http.local_addr(), "Captive portal serving");

    let session = Arc::clone(guard.session());
    let finished = with_optional_timeout(timeout, async {
        tokio::select! {
            () = session.flagged(SessionFlag::CredentialsReceived) => Ok(RestartReason::Provisioned),
            connected = ctx.connectivity.wait_for(ConnectivityState::Connected, None) => {
                connected.map(|()| RestartReason::ProvisioningComplete)
            }
        }
    })
    .await;

    // Everything the flow started is gone before the restart is requested
    http.stop().await;
    dns.abort();
    if let Err(e) = dns.await {
        if !e.is_cancelled() {
            warn!(error = %e, "DNS redirector task failed");
        }
    }
    stop_access_point(ctx).await;
    drop(guard);
    let reason = finished?;

    info!(?reason, "Captive portal closed");
    ctx.system.schedule_restart(config.options.restart_delay, reason);
    Ok(())
}

async fn stop_access_point<R: RadioDriver>(ctx: &NetworkContext<R>) {
    if let Err(e) = ctx.radio.stop_access_point().await {
        warn!(error = %e, "Failed to stop access point");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{net::Ipv4Addr, path::Path};

    use super::*;
    use crate::{
        backend::mock_radio::RadioCall,
        core::{
            context::testing::Harness,
            error::ServiceError,
            events::{EventTranslator, PlatformEvent},
            system::RestartRequest,
        },
        transport::dns::message::encode_query,
    };
    use hickory_proto::rr::RecordType;
    use pretty_assertions::assert_eq;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpStream, UdpSocket},
    };

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    pub(crate) fn portal_config(web_root: &Path) -> PortalConfig {
        PortalConfig {
            access_point: AccessPointConfig {
                ssid: "menjin".into(),
                passphrase: None,
                address: Ipv4Addr::LOCALHOST,
                prefix_len: 24,
                channel: 1,
                max_connections: 3,
            },
            dns_port: free_port(),
            http_port: free_port(),
            options: PortalOptions {
                web_root: web_root.to_path_buf(),
                restart_delay: Duration::from_millis(10),
                scan_limit: 10,
            },
        }
    }

    async fn post_config(port: u16, body: &str) -> String {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let mut stream = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match TcpStream::connect(addr).await {
                    Ok(stream) => break stream,
                    Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
                }
            }
        })
        .await
        .expect("portal never came up");

        let request = format!(
            "POST /api/config HTTP/1.1\r\nHost: 192.168.4.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn resolve(port: u16, name: &str) -> Option<Vec<u8>> {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(
                &encode_query(0x1234, name, RecordType::A),
                (Ipv4Addr::LOCALHOST, port),
            )
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        match tokio::time::timeout(Duration::from_millis(500), socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
            _ => None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_accepted_credentials_tear_down_before_restart() {
        let mut harness = Harness::new().await;
        EventTranslator::new(Arc::clone(&harness.ctx), harness.take_machine()).spawn();
        let root = tempfile::tempdir().unwrap();
        let config = portal_config(root.path());

        let flow = tokio::spawn({
            let ctx = Arc::clone(&harness.ctx);
            let config = config.clone();
            async move { run(&ctx, &config, None).await }
        });

        let response = post_config(
            config.http_port,
            r#"{"wifi_ssid":"Home","wifi_password":"secret123"}"#,
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("ok"));

        let restart = tokio::time::timeout(Duration::from_secs(10), harness.restarts.recv())
            .await
            .expect("restart requested")
            .unwrap();
        assert_eq!(restart.reason, RestartReason::Provisioned);

        // By the time the restart is requested the portal is gone
        let calls = harness.ctx.radio.calls().await;
        assert!(calls.contains(&RadioCall::StopAccessPoint));
        assert!(harness.ctx.sessions.current().is_none());
        assert!(
            TcpStream::connect((Ipv4Addr::LOCALHOST, config.http_port))
                .await
                .is_err()
        );
        assert_eq!(resolve(config.dns_port, "example.com").await, None);
        flow.await.unwrap().unwrap();

        assert_eq!(harness.ctx.station.get().unwrap().ssid(), "Home");
        assert_eq!(harness.ctx.settings.current().await.wifi_ssid, "Home");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connectivity_closes_portal() {
        let mut harness = Harness::new().await;
        EventTranslator::new(Arc::clone(&harness.ctx), harness.take_machine()).spawn();
        let root = tempfile::tempdir().unwrap();
        let config = portal_config(root.path());

        let flow = tokio::spawn({
            let ctx = Arc::clone(&harness.ctx);
            let config = config.clone();
            async move { run(&ctx, &config, Some(Duration::from_secs(10))).await }
        });

        // Every name resolves to the access point
        let answer = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let name = "connectivitycheck.gstatic.com";
                if let Some(answer) = resolve(config.dns_port, name).await {
                    break answer;
                }
            }
        })
        .await
        .expect("DNS never came up");
        assert_eq!(&answer[answer.len() - 4..], &[127, 0, 0, 1]);

        harness
            .ctx
            .radio
            .emit(PlatformEvent::GotAddress(Ipv4Addr::new(192, 168, 1, 50)))
            .await;
        flow.await.unwrap().unwrap();

        assert!(harness.ctx.sessions.current().is_none());
        assert!(
            harness
                .ctx
                .radio
                .calls()
                .await
                .contains(&RadioCall::StopAccessPoint)
        );
        assert_eq!(
            harness.restarts.recv().await,
            Some(RestartRequest {
                reason: RestartReason::ProvisioningComplete
            })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_stops_access_point() {
        let mut harness = Harness::new().await;
        EventTranslator::new(Arc::clone(&harness.ctx), harness.take_machine()).spawn();
        let root = tempfile::tempdir().unwrap();
        let config = portal_config(root.path());

        let result = run(&harness.ctx, &config, Some(Duration::from_millis(200))).await;
        assert!(matches!(result, Err(ServiceError::Timeout)));

        assert!(harness.ctx.sessions.current().is_none());
        assert!(
            harness
                .ctx
                .radio
                .calls()
                .await
                .contains(&RadioCall::StopAccessPoint)
        );
        assert!(harness.restarts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_access_point_failure_releases_session() {
        let harness = Harness::new().await;
        harness.ctx.radio.set_access_point_failure(true).await;
        let root = tempfile::tempdir().unwrap();

        let result = run(&harness.ctx, &portal_config(root.path()), None).await;
        assert!(matches!(result, Err(ServiceError::Radio(_))));
        assert!(harness.ctx.sessions.current().is_none());
    }
}
