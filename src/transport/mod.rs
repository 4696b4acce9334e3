//! Network surfaces served to provisioning clients

pub mod dns;
pub mod http;
