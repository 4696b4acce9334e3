//! Radio driver abstraction layer

pub mod mock_radio;
pub mod radio;
pub mod wpa_supplicant;

pub use radio::RadioDriver;
pub use wpa_supplicant::WpaSupplicantRadio;

#[cfg(test)]
pub use mock_radio::MockRadio;
