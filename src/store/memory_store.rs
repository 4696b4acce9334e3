//! In-memory credential store for tests and volatile setups

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use crate::{
    core::error::{StoreError, StoreResult},
    store::credential_store::{CredentialStore, validate_name},
};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<(String, String), Vec<u8>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail
    pub fn set_write_failure(&self, should_fail: bool) {
        self.fail_writes.store(should_fail, Ordering::SeqCst);
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_name(namespace)?;
        validate_name(key)?;
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn write(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_name(namespace)?;
        validate_name(key)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write failure injected".into()));
        }
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((namespace.to_string(), key.to_string()), value.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn erase(&self, namespace: &str, key: &str) -> StoreResult<()> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
