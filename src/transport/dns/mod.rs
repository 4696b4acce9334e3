//! Captive DNS

pub mod message;
pub mod redirector;

pub use redirector::{CaptiveDnsRedirector, RedirectRule};
