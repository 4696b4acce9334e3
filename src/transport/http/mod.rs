//! Configuration HTTP surface and captive-portal probes

pub mod captive;
pub mod handler;
pub mod server;

pub use handler::{Portal, PortalOptions};
pub use server::{PortalServer, configure, serve_gated};
