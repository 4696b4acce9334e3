//! Provisioning flows
//!
//! The coordinator either joins the stored network or runs exactly one of
//! the SmartConfig and SoftAP flows.

pub mod coordinator;
pub mod smartconfig;
pub mod softap;

pub use coordinator::{ProvisioningCoordinator, ProvisioningOutcome};
pub use softap::PortalConfig;
