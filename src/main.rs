//! Gateway Provisioning - Main Entry Point

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use gateway_provisioning::{
    backend::WpaSupplicantRadio,
    config::{CliArgs, Settings},
    core::{
        context::NetworkContext,
        indicator::{Indicator, NoLed, SysfsLed},
        system::{RESTART_EXIT_CODE, RestartRequest, SystemControl},
    },
    provisioning::{ProvisioningCoordinator, ProvisioningOutcome},
    store::{FileCredentialStore, SettingsStore},
    transport::http::{Portal, serve_gated},
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gateway_provisioning=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    info!(?args, "Starting gateway provisioning");

    let settings = Settings::from(args);
    if let Err(message) = settings.validate() {
        error!(%message, "Invalid configuration");
        return Err(message.into());
    }

    let store = Arc::new(FileCredentialStore::new(settings.storage_dir.clone()));
    let record_store = Arc::new(SettingsStore::open(store).await?);
    info!(dir = %settings.storage_dir.display(), "Settings loaded");

    let radio = match WpaSupplicantRadio::new(
        settings.interface.clone(),
        settings.ap_interface.clone(),
        settings.runtime_dir.clone(),
    )
    .await
    {
        Ok(radio) => Arc::new(radio),
        Err(e) => {
            error!(error = %e, interface = %settings.interface, "Radio initialisation failed");
            return Err(e.into());
        }
    };
    info!("Radio initialized for interface: {}", settings.interface);

    let (system, mut restarts) = SystemControl::new();
    let (ctx, machine) = NetworkContext::new(radio, record_store, system);

    match &settings.status_led {
        Some(name) => Indicator::new(SysfsLed::new(name), ctx.connectivity.clone()).spawn(),
        None => Indicator::new(NoLed, ctx.connectivity.clone()).spawn(),
    };

    let coordinator =
        ProvisioningCoordinator::new(Arc::clone(&ctx), machine, settings.mode, settings.portal());
    if let Err(e) = coordinator.check_supported() {
        error!(error = %e, interface = %settings.interface, "Invalid configuration");
        return Err(e.into());
    }

    // Provisioning may already ask for a restart before it returns
    let outcome = tokio::select! {
        result = coordinator.run(None) => result?,
        request = restarts.recv() => return Ok(restart_exit(request)),
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C) during provisioning, shutting down");
            return Ok(ExitCode::SUCCESS);
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM during provisioning, shutting down");
            return Ok(ExitCode::SUCCESS);
        }
    };
    info!(?outcome, "Provisioning finished");

    // A closed portal has already requested its restart
    if outcome != ProvisioningOutcome::SoftAp {
        notify_ready();

        if settings.local_api {
            let portal = Portal::new(Arc::clone(&ctx), settings.portal_options());
            tokio::spawn(serve_gated(
                portal,
                settings.local_api_addr(),
                ctx.gate.subscribe(),
            ));
            info!(addr = %settings.local_api_addr(), "Local configuration API enabled");
        }
    }

    let code = wait_for_exit(&mut restarts).await;

    notify_stopping();

    info!("Shutting down...");
    Ok(code)
}

async fn wait_for_exit(restarts: &mut mpsc::UnboundedReceiver<RestartRequest>) -> ExitCode {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully");
            ExitCode::SUCCESS
        }
        _ = shutdown_signal() => {
            info!("Received SIGTERM, shutting down gracefully");
            ExitCode::SUCCESS
        }
        request = restarts.recv() => restart_exit(request),
    }
}

fn restart_exit(request: Option<RestartRequest>) -> ExitCode {
    match request {
        Some(request) => {
            info!(reason = ?request.reason, "Restarting");
            ExitCode::from(RESTART_EXIT_CODE)
        }
        None => {
            warn!("Restart channel closed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "systemd")]
fn notify_ready() {
    if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %e, "Failed to notify systemd");
    }
}

#[cfg(feature = "systemd")]
fn notify_stopping() {
    if let Err(e) = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]) {
        warn!(error = %e, "Failed to notify systemd");
    }
}

#[cfg(not(feature = "systemd"))]
fn notify_ready() {}

#[cfg(not(feature = "systemd"))]
fn notify_stopping() {}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await
}
