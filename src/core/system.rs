//! Restart requests
//!
//! A restart is an orderly process exit with [`RESTART_EXIT_CODE`]; the
//! service supervisor brings the process back up.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Exit code asking the supervisor for an immediate restart
pub const RESTART_EXIT_CODE: u8 = 3;

/// Why a restart was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// New station credentials were submitted
    Provisioned,
    /// The SoftAP flow finished and its resources are released
    ProvisioningComplete,
    /// Settings were reset to factory defaults
    FactoryReset,
    /// Explicit request through the configuration API
    Requested,
}

/// Restart request delivered to `main`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest {
    pub reason: RestartReason,
}

/// Handle used by flows and HTTP handlers to ask for a restart
#[derive(Debug, Clone)]
pub struct SystemControl {
    tx: mpsc::UnboundedSender<RestartRequest>,
}

impl SystemControl {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RestartRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Request a restart after `delay`
    ///
    /// The delay lets an HTTP answer reach the client before the process
    /// goes away.
    pub fn schedule_restart(&self, delay: Duration, reason: RestartReason) {
        info!(?reason, ?delay, "Restart scheduled");
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(RestartRequest { reason }).is_err() {
                warn!(?reason, "Restart request dropped, no receiver");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_restart_delivered_after_delay() {
        let (system, mut rx) = SystemControl::new();
        let started = tokio::time::Instant::now();

        system.schedule_restart(Duration::from_millis(300), RestartReason::Requested);

        let request = rx.recv().await.unwrap();
        assert_eq!(request.reason, RestartReason::Requested);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
