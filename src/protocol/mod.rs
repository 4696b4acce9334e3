//! Configuration API message definitions

pub mod request;
pub mod response;

pub use {
    request::ConfigRequest,
    response::{ConfigResponse, ScanEntry},
};
