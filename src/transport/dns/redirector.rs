//! Wildcard DNS responder for the provisioning access point

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use hickory_proto::op::ResponseCode;
use tokio::{net::UdpSocket, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    core::error::TransportResult,
    transport::dns::message::{build_response, parse_query},
};

const MAX_DATAGRAM: usize = 512;

/// Maps a domain pattern onto an address
///
/// Patterns are `*` (any name), `*.suffix` (the suffix and any subdomain) or
/// an exact name. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub pattern: String,
    pub answer: Ipv4Addr,
}

impl RedirectRule {
    pub fn new(pattern: impl Into<String>, answer: Ipv4Addr) -> Self {
        Self {
            pattern: pattern.into().to_ascii_lowercase(),
            answer,
        }
    }

    /// Answer every name with `answer`
    pub fn wildcard(answer: Ipv4Addr) -> Self {
        Self::new("*", answer)
    }

    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        match self.pattern.as_str() {
            "*" => true,
            pattern => match pattern.strip_prefix("*.") {
                Some(suffix) => {
                    name == suffix
                        || name
                            .strip_suffix(suffix)
                            .is_some_and(|head| head.ends_with('.'))
                }
                None => name == pattern,
            },
        }
    }
}

/// First matching rule wins
pub fn resolve(rules: &[RedirectRule], name: &str) -> Option<Ipv4Addr> {
    rules.iter().find(|r| r.matches(name)).map(|r| r.answer)
}

/// Answer one datagram, `None` when it should be dropped
pub fn answer(rules: &[RedirectRule], packet: &[u8]) -> Option<Vec<u8>> {
    let query = parse_query(packet)?;

    let Some(address) = resolve(rules, &query.name) else {
        return build_response(&query, None, ResponseCode::NXDomain);
    };

    if query.is_address_query() {
        build_response(&query, Some(address), ResponseCode::NoError)
    } else {
        build_response(&query, None, ResponseCode::NoError)
    }
}

pub struct CaptiveDnsRedirector {
    socket: UdpSocket,
    rules: Arc<[RedirectRule]>,
}

impl CaptiveDnsRedirector {
    pub async fn bind(addr: SocketAddr, rules: Vec<RedirectRule>) -> TransportResult<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %socket.local_addr()?, "DNS redirector listening");
        Ok(Self {
            socket,
            rules: rules.into(),
        })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Serve queries until the task is aborted
    pub async fn run(self) {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "DNS receive failed");
                    continue;
                }
            };

            let Some(response) = answer(&self.rules, &buf[..len]) else {
                debug!(%peer, len, "Dropping malformed DNS packet");
                continue;
            };

            if let Err(e) = self.socket.send_to(&response, peer).await {
                warn!(%peer, error = %e, "DNS reply failed");
            }
        }
    }
}
