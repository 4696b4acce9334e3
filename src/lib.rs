//! Gateway Provisioning
//!
//! WiFi onboarding and connectivity supervision for a headless
//! access-control gateway:
//! - SmartConfig (credentials broadcast by a phone app)
//! - SoftAP with captive DNS and an HTTP configuration portal
//!
//! A single connectivity state machine gates the services that need the
//! network.

pub mod backend;
pub mod config;
pub mod core;
pub mod protocol;
pub mod provisioning;
pub mod store;
pub mod transport;

pub use core::{
    error::{ServiceError, StoreError, TransportError, WifiError},
    gate::{GateListener, GateSignal, ServiceGate},
    state::ConnectivityMonitor,
    types::{ConnectivityState, ProvisioningFlow, StationCredentials, WifiNetwork},
};
