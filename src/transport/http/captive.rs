//! Captive-portal probe recognition
//!
//! Operating systems detect captive portals by fetching well-known URLs.
//! Answering them the way each OS expects makes it pop up the portal page
//! (Apple) or treat the link as usable (Android, Windows, GNOME).

use actix_web::{HttpResponse, http::header};

/// Paths probed by the connectivity checks
pub const PROBE_PATHS: [&str; 3] = ["/hotspot-detect.html", "/generate_204", "/generate204"];

pub const PORTAL_PAGE: &str = "/index.html";

const APPLE_REDIRECT: &str = "<script type='text/javascript'>location = '/index.html'</script>";
const GNOME_ONLINE: &str = "NetworkManager is online";
const REDIRECT_BODY: &str = "Redirect to the captive portal";

/// Canned answer for a known probe host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResponse {
    /// HTML page that navigates to the portal
    PortalScript,
    /// Empty 204, the host considers the network online
    NoContent,
    /// Plain text body
    Text(&'static str),
}

impl ProbeResponse {
    /// Look up the `Host` header value, port ignored
    pub fn classify_host(host: &str) -> Option<Self> {
        let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
        match host.as_str() {
            "captive.apple.com" => Some(Self::PortalScript),
            "connectivitycheck.gstatic.com" | "clients3.google.com" | "www.msftncsi.com" => {
                Some(Self::NoContent)
            }
            "nmcheck.gnome.org" => Some(Self::Text(GNOME_ONLINE)),
            _ => None,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        match self {
            Self::PortalScript => HttpResponse::Ok()
                .content_type("text/html")
                .body(APPLE_REDIRECT),
            Self::NoContent => HttpResponse::NoContent().finish(),
            Self::Text(body) => HttpResponse::Ok().content_type("text/plain").body(body),
        }
    }
}

pub fn is_probe_path(path: &str) -> bool {
    PROBE_PATHS.contains(&path)
}

/// Temporary redirect to the portal page
pub fn redirect_to_portal() -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, PORTAL_PAGE))
        .content_type("text/plain")
        .body(REDIRECT_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_classify_host() {
        assert_eq!(
            ProbeResponse::classify_host("captive.apple.com"),
            Some(ProbeResponse::PortalScript)
        );
        assert_eq!(
            ProbeResponse::classify_host("connectivitycheck.gstatic.com:80"),
            Some(ProbeResponse::NoContent)
        );
        assert_eq!(
            ProbeResponse::classify_host("WWW.MSFTNCSI.COM"),
            Some(ProbeResponse::NoContent)
        );
        assert_eq!(
            ProbeResponse::classify_host("nmcheck.gnome.org"),
            Some(ProbeResponse::Text("NetworkManager is online"))
        );
        assert_eq!(ProbeResponse::classify_host("192.168.4.1"), None);
    }

    #[test]
    fn test_redirect() {
        let response = redirect_to_portal();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/index.html"
        );
    }

    #[test]
    fn test_no_content() {
        assert_eq!(
            ProbeResponse::NoContent.into_response().status(),
            StatusCode::NO_CONTENT
        );
    }
}
