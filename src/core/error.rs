//! Error types for gateway provisioning

use thiserror::Error;

use super::types::ProvisioningFlow;

/// Result type for radio driver operations
pub type WifiResult<T> = Result<T, WifiError>;

/// Result type for durable storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for provisioning and service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors related to the radio driver
#[derive(Error, Debug, Clone)]
pub enum WifiError {
    #[error("WiFi scan failed: {0}")]
    ScanFailed(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid SSID: {0}")]
    InvalidSsid(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Network interface error: {0}")]
    InterfaceError(String),

    #[error("wpa_supplicant error: {0}")]
    WpaSupplicantError(String),

    #[error("Access point error: {0}")]
    AccessPointError(String),

    #[error("{0} is not supported by this radio")]
    Unsupported(&'static str),

    #[error("{operation} failed with platform code {code}")]
    Platform { operation: &'static str, code: i32 },
}

/// Errors related to the credential store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors related to provisioning flows and dependent services
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("A {active} provisioning session is already active")]
    SessionActive { active: ProvisioningFlow },

    #[error("{flow} provisioning is not supported by this radio")]
    Unsupported { flow: ProvisioningFlow },

    #[error("Timed out waiting for connectivity")]
    Timeout,

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Task failed: {0}")]
    TaskFailed(String),

    #[error("Radio error: {0}")]
    Radio(#[from] WifiError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors related to the DNS and HTTP surfaces
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
