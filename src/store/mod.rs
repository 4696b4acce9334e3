//! Durable settings persistence

pub mod credential_store;
pub mod file_store;
pub mod memory_store;
pub mod settings;

pub use credential_store::CredentialStore;
pub use file_store::FileCredentialStore;
pub use memory_store::MemoryCredentialStore;
pub use settings::{SettingsRecord, SettingsStore};
