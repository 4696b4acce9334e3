//! Broadcast-decode provisioning
//!
//! The radio listens for credentials encoded by a phone app. Decoded frames
//! are applied to the station immediately; the credentials are persisted
//! only once the phone acknowledges the handshake.

use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    backend::RadioDriver,
    core::{
        context::NetworkContext,
        error::ServiceResult,
        events::SmartConfigEvent,
        session::SessionGuard,
        types::{ConnectivityState, ProvisioningFlow, StationCredentials, StationStorage},
    },
};

/// Start the decoder and wait for the first connectivity
///
/// On success the session task keeps running until the handshake is
/// acknowledged; its handle is returned.
pub async fn run<R: RadioDriver>(
    ctx: &Arc<NetworkContext<R>>,
    timeout: Option<Duration>,
) -> ServiceResult<JoinHandle<Option<StationCredentials>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let guard = ctx.sessions.open(ProvisioningFlow::SmartConfig, Some(tx))?;

    ctx.radio.start_station().await?;
    ctx.radio.start_smartconfig().await?;
    info!("SmartConfig started, waiting for credentials");

    let task = tokio::spawn(session_task(Arc::clone(ctx), guard, rx));

    if let Err(e) = ctx
        .connectivity
        .wait_for(ConnectivityState::Connected, timeout)
        .await
    {
        task.abort();
        if let Err(stop) = ctx.radio.stop_smartconfig().await {
            warn!(error = %stop, "Failed to stop SmartConfig");
        }
        return Err(e);
    }

    Ok(task)
}

/// Consume decoder events until the handshake is acknowledged
async fn session_task<R: RadioDriver>(
    ctx: Arc<NetworkContext<R>>,
    guard: SessionGuard,
    mut rx: mpsc::UnboundedReceiver<SmartConfigEvent>,
) -> Option<StationCredentials> {
    let session = guard.session();
    let mut received: Option<StationCredentials> = None;
    let mut channel = 0;

    while let Some(event) = rx.recv().await {
        match event {
            SmartConfigEvent::ScanDone => debug!(session = %session.id(), "SmartConfig scan done"),
            SmartConfigEvent::FoundChannel(found) => {
                debug!(session = %session.id(), channel = found, "SmartConfig found channel");
                channel = found;
            }
            SmartConfigEvent::GotCredentials {
                ssid,
                password,
                bssid,
            } => {
                let credentials = match StationCredentials::from_raw(&ssid, &password, bssid) {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        debug!(ssid = %hex::encode(&ssid), error = %e, "Discarding malformed credential frame");
                        continue;
                    }
                };
                info!(ssid = credentials.ssid(), "SmartConfig credentials received");
                apply(&ctx, &credentials).await;
                received = Some(credentials);
            }
            SmartConfigEvent::AckDone => {
                match &received {
                    Some(credentials) => {
                        if let Err(e) = ctx.settings.save_station(credentials, channel).await {
                            error!(error = %e, "Failed to persist SmartConfig credentials");
                        }
                    }
                    None => warn!("Handshake acknowledged before any valid credentials"),
                }
                if let Err(e) = ctx.radio.stop_smartconfig().await {
                    warn!(error = %e, "Failed to stop SmartConfig");
                }
                info!(session = %session.id(), "SmartConfig complete");
                break;
            }
        }
    }

    drop(guard);
    received
}

/// Replace any previous association with `credentials`
async fn apply<R: RadioDriver>(ctx: &NetworkContext<R>, credentials: &StationCredentials) {
    if let Err(e) = ctx.radio.disconnect().await {
        warn!(error = %e, "Disconnect before reconfigure failed");
    }
    if let Err(e) = ctx
        .radio
        .configure_station(credentials, StationStorage::Volatile)
        .await
    {
        warn!(error = %e, "Failed to apply SmartConfig credentials");
        return;
    }
    ctx.station.set(credentials.clone());
    if let Err(e) = ctx.radio.connect().await {
        warn!(error = %e, "Station connect failed");
    }
}
