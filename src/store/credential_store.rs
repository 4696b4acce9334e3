//! Durable key-value persistence capability

use crate::core::error::{StoreError, StoreResult};

/// Namespace + key addressed blob storage
///
/// Operations are synchronous and may block; async callers run them on the
/// blocking pool.
pub trait CredentialStore: Send + Sync + 'static {
    /// Read a value, `None` when it was never written
    fn read(&self, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace a value as a whole
    fn write(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    fn erase(&self, namespace: &str, key: &str) -> StoreResult<()>;
}

/// Reject names that could escape their namespace
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(StoreError::InvalidKey(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("sys_param").is_ok());
        assert!(validate_name("param").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
