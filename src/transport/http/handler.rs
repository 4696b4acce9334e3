//! Configuration API and portal handlers

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use actix_files::NamedFile;
use actix_web::{
    HttpRequest, HttpResponse,
    http::{Method, header},
    web,
};
use tracing::{debug, error, info, warn};

use crate::{
    backend::RadioDriver,
    core::{
        context::NetworkContext,
        session::ProvisioningSession,
        system::RestartReason,
        types::{SessionFlag, StationStorage},
    },
    protocol::{ConfigRequest, ConfigResponse, ScanEntry},
    transport::http::captive::{ProbeResponse, is_probe_path, redirect_to_portal},
};

/// Static behaviour of the portal
#[derive(Debug, Clone)]
pub struct PortalOptions {
    /// Directory holding `index.html` and its assets
    pub web_root: PathBuf,
    pub restart_delay: Duration,
    pub scan_limit: usize,
}

/// Shared state of the HTTP surface
pub struct Portal<R> {
    ctx: Arc<NetworkContext<R>>,
    options: PortalOptions,
    session: Option<Arc<ProvisioningSession>>,
}

impl<R> Clone for Portal<R> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            options: self.options.clone(),
            session: self.session.clone(),
        }
    }
}

impl<R: RadioDriver> Portal<R> {
    pub fn new(ctx: Arc<NetworkContext<R>>, options: PortalOptions) -> Self {
        Self {
            ctx,
            options,
            session: None,
        }
    }

    /// Attribute submitted credentials to a provisioning session
    pub fn with_session(mut self, session: Arc<ProvisioningSession>) -> Self {
        self.session = Some(session);
        self
    }

    fn host(req: &HttpRequest) -> &str {
        req.headers()
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }

    pub async fn probe(req: HttpRequest) -> HttpResponse {
        let host = Self::host(&req);
        match ProbeResponse::classify_host(host) {
            Some(probe) => {
                info!(%host, path = req.path(), "Captive portal probe answered");
                probe.into_response()
            }
            None => {
                debug!(%host, path = req.path(), "Redirecting to portal");
                redirect_to_portal()
            }
        }
    }

    pub async fn config_get(portal: web::Data<Self>) -> HttpResponse {
        let record = portal.ctx.settings.current().await;
        HttpResponse::Ok().json(ConfigResponse::from(record))
    }

    pub async fn config_post(portal: web::Data<Self>, body: web::Bytes) -> HttpResponse {
        let request: ConfigRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejected configuration: invalid JSON");
                return HttpResponse::BadRequest().body(format!("Invalid JSON: {e}"));
            }
        };

        let credentials = match request.station_credentials() {
            Ok(credentials) => credentials,
            Err(message) => {
                warn!(%message, "Rejected configuration");
                return HttpResponse::BadRequest().body(message);
            }
        };
        info!(ssid = credentials.ssid(), "WiFi settings accepted");

        if let Err(e) = portal
            .ctx
            .radio
            .configure_station(&credentials, StationStorage::Durable)
            .await
        {
            error!(error = %e, "Failed to store WiFi configuration");
            return HttpResponse::InternalServerError()
                .body("Failed to write WiFi configuration");
        }

        let saved = portal
            .ctx
            .settings
            .update(|record| {
                request.apply_service_fields(record);
                record.set_station(&credentials, 0);
            })
            .await;
        if let Err(e) = saved {
            error!(error = %e, "Save settings failed");
            return HttpResponse::InternalServerError()
                .body("Failed to save settings to persistent storage");
        }

        portal.ctx.station.set(credentials);
        match &portal.session {
            // The provisioning flow tears the portal down, then restarts
            Some(session) => {
                session.mark(SessionFlag::CredentialsReceived);
            }
            None => portal
                .ctx
                .system
                .schedule_restart(portal.options.restart_delay, RestartReason::Provisioned),
        }
        HttpResponse::Ok().content_type("text/plain").body("ok")
    }

    pub async fn scan(portal: web::Data<Self>) -> HttpResponse {
        match portal.ctx.radio.scan(portal.options.scan_limit).await {
            Ok(networks) => {
                let entries: Vec<ScanEntry> = networks.into_iter().map(Into::into).collect();
                HttpResponse::Ok().json(entries)
            }
            Err(e) => {
                error!(error = %e, "Scan failed");
                HttpResponse::InternalServerError().body(e.to_string())
            }
        }
    }

    pub async fn restart(portal: web::Data<Self>) -> HttpResponse {
        warn!("Restart requested through the configuration API");
        portal
            .ctx
            .system
            .schedule_restart(portal.options.restart_delay, RestartReason::Requested);
        HttpResponse::Ok().content_type("text/plain").body("ok")
    }

    pub async fn reset(portal: web::Data<Self>) -> HttpResponse {
        warn!("Resetting to factory defaults");

        if let Err(e) = portal.ctx.settings.reset_to_defaults().await {
            error!(error = %e, "Failed to reset settings");
            return HttpResponse::InternalServerError().body("Failed to reset settings");
        }
        if let Err(e) = portal.ctx.radio.restore().await {
            warn!(error = %e, "Failed to clear radio station storage");
        }
        portal.ctx.station.clear();

        portal
            .ctx
            .system
            .schedule_restart(portal.options.restart_delay, RestartReason::FactoryReset);
        HttpResponse::Ok().content_type("text/plain").body("ok")
    }

    pub async fn mqtt_client_id(portal: web::Data<Self>) -> HttpResponse {
        let record = portal.ctx.settings.current().await;
        let id = record.effective_client_id(portal.ctx.radio.mac_address());
        HttpResponse::Ok().content_type("text/plain").body(id)
    }

    /// Everything not matched by an API route
    pub async fn static_files(portal: web::Data<Self>, req: HttpRequest) -> HttpResponse {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return HttpResponse::MethodNotAllowed().finish();
        }

        let path = req.path();
        if is_probe_path(path) {
            return Self::probe(req).await;
        }

        let file = if path.ends_with('/') {
            if let Some(probe) = ProbeResponse::classify_host(Self::host(&req)) {
                return probe.into_response();
            }
            portal.options.web_root.join("index.html")
        } else {
            match resolve_static(&portal.options.web_root, path) {
                Some(file) => file,
                None => return HttpResponse::NotFound().body("File does not exist"),
            }
        };

        match NamedFile::open_async(&file).await {
            Ok(named) => named.into_response(&req),
            Err(_) => {
                debug!(path = %file.display(), "Static file not found");
                HttpResponse::NotFound().body("File does not exist")
            }
        }
    }
}

/// Map a request path below `root`, refusing anything that climbs out
fn resolve_static(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_static() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve_static(root, "/css/app.css"),
            Some(PathBuf::from("/srv/www/css/app.css"))
        );
        assert_eq!(resolve_static(root, "/../etc/passwd"), None);
        assert_eq!(resolve_static(root, "/a/../../b"), None);
    }
}
