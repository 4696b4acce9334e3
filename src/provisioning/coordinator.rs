use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    backend::RadioDriver,
    core::{
        context::NetworkContext,
        error::{ServiceError, ServiceResult},
        events::EventTranslator,
        state::ConnectivityStateMachine,
        types::{ConnectivityState, ProvisioningFlow, StationStorage},
    },
    provisioning::{
        smartconfig,
        softap::{self, PortalConfig},
    },
};

/// How the device reached the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    /// Stored credentials were used
    Station,
    SmartConfig,
    /// The portal has closed and a restart is pending
    SoftAp,
}

/// Decides between the stored-credential path and exactly one
/// provisioning flow
pub struct ProvisioningCoordinator<R> {
    ctx: Arc<NetworkContext<R>>,
    translator: EventTranslator<R>,
    mode: ProvisioningFlow,
    portal: PortalConfig,
}

impl<R: RadioDriver> ProvisioningCoordinator<R> {
    /// Must be built before anything starts the radio, so no early event is
    /// missed by the translator.
    pub fn new(
        ctx: Arc<NetworkContext<R>>,
        machine: ConnectivityStateMachine,
        mode: ProvisioningFlow,
        portal: PortalConfig,
    ) -> Self {
        let translator = EventTranslator::new(Arc::clone(&ctx), machine);
        Self {
            ctx,
            translator,
            mode,
            portal,
        }
    }

    /// Reject a provisioning flow the radio cannot run
    pub fn check_supported(&self) -> ServiceResult<()> {
        match self.mode {
            ProvisioningFlow::SmartConfig if !self.ctx.radio.supports_smartconfig() => {
                Err(ServiceError::Unsupported { flow: self.mode })
            }
            _ => Ok(()),
        }
    }

    /// Bring the station online, provisioning it first when needed
    ///
    /// Returns once connectivity is reached. The event translator keeps
    /// running in the background afterwards.
    pub async fn run(self, timeout: Option<Duration>) -> ServiceResult<ProvisioningOutcome> {
        self.check_supported()?;
        let Self {
            ctx,
            translator,
            mode,
            portal,
        } = self;
        translator.spawn();

        let record = ctx.settings.current().await;
        if let Some(credentials) = record.station_credentials() {
            info!(ssid = credentials.ssid(), "Device provisioned, joining network");
            ctx.station.set(credentials.clone());
            ctx.radio
                .configure_station(&credentials, StationStorage::Volatile)
                .await?;
            ctx.radio.start_station().await?;
            ctx.connectivity
                .wait_for(ConnectivityState::Connected, timeout)
                .await?;
            return Ok(ProvisioningOutcome::Station);
        }
        if record.provisioned {
            warn!("Stored record marked provisioned without a usable SSID");
        }

        info!(flow = %mode, "Device not provisioned, starting provisioning");
        match mode {
            ProvisioningFlow::SmartConfig => {
                // The session task finishes on its own once acknowledged
                smartconfig::run(&ctx, timeout).await?;
                Ok(ProvisioningOutcome::SmartConfig)
            }
            ProvisioningFlow::SoftAp => {
                softap::run(&ctx, &portal, timeout).await?;
                Ok(ProvisioningOutcome::SoftAp)
            }
        }
    }
}
