//! HTTP server wiring for the portal

use std::{io, net::SocketAddr};

use actix_web::{App, HttpServer, dev::ServerHandle, web};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    backend::RadioDriver,
    core::{
        error::TransportResult,
        gate::{GateListener, GateSignal},
    },
    transport::http::{captive::PROBE_PATHS, handler::Portal},
};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 10 * 1024;

/// Register the portal routes
///
/// The catch-all static file route is registered last so API and probe
/// routes take precedence.
pub fn configure<R: RadioDriver>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .route("/api/config", web::get().to(Portal::<R>::config_get))
        .route("/api/config", web::post().to(Portal::<R>::config_post))
        .route("/api/scan", web::get().to(Portal::<R>::scan))
        .route("/api/restart", web::get().to(Portal::<R>::restart))
        .route("/api/reset", web::get().to(Portal::<R>::reset))
        .route("/api/mqtt-client-id", web::get().to(Portal::<R>::mqtt_client_id));

    for path in PROBE_PATHS {
        cfg.route(path, web::route().to(Portal::<R>::probe));
    }

    cfg.route("/{tail:.*}", web::route().to(Portal::<R>::static_files));
}

/// Grace period for in-flight requests when the portal stops
const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

/// A running portal server
pub struct PortalServer {
    handle: ServerHandle,
    task: JoinHandle<io::Result<()>>,
    local_addr: SocketAddr,
}

impl PortalServer {
    /// Bind `addr` and start serving on the current runtime
    pub fn start<R: RadioDriver>(portal: Portal<R>, addr: SocketAddr) -> TransportResult<Self> {
        let data = web::Data::new(portal);
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .configure(configure::<R>)
        })
        .workers(1)
        .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
        .disable_signals()
        .bind(addr)?;

        let local_addr = server.addrs().first().copied().unwrap_or(addr);
        let server = server.run();
        let handle = server.handle();
        info!(%local_addr, "HTTP portal listening");

        Ok(Self {
            handle,
            task: tokio::spawn(server),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the server to finish
    pub async fn stop(self) {
        self.handle.stop(true).await;
        match self.task.await {
            Ok(Ok(())) => debug!("HTTP portal stopped"),
            Ok(Err(e)) => warn!(error = %e, "HTTP portal exited with error"),
            Err(e) => warn!(error = %e, "HTTP portal task failed"),
        }
    }
}

/// Run the portal only while the gate is open
///
/// Used for the local configuration API after provisioning.
pub async fn serve_gated<R: RadioDriver>(
    portal: Portal<R>,
    addr: SocketAddr,
    mut gate: GateListener,
) {
    let mut running: Option<PortalServer> = None;

    while let Some(signal) = gate.next().await {
        match signal {
            GateSignal::Start if running.is_none() => {
                match PortalServer::start(portal.clone(), addr) {
                    Ok(server) => running = Some(server),
                    Err(e) => warn!(error = %e, "Local API failed to start"),
                }
            }
            GateSignal::Stop => {
                if let Some(server) = running.take() {
                    info!("Network lost, stopping local API");
                    server.stop().await;
                }
            }
            GateSignal::Start => {}
        }
    }

    if let Some(server) = running.take() {
        server.stop().await;
    }
}
