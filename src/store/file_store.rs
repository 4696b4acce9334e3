//! Directory-backed credential store
//!
//! Each namespace is a directory below the root and each key a file in it.
//! Writes go to a temporary file that is renamed over the old value, so a
//! reader never sees a torn record.

use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use tracing::debug;

use crate::{
    core::error::StoreResult,
    store::credential_store::{CredentialStore, validate_name},
};

#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, namespace: &str, key: &str) -> StoreResult<PathBuf> {
        validate_name(namespace)?;
        validate_name(key)?;
        Ok(self.root.join(namespace).join(key))
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self, namespace: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path(namespace, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        let path = self.path(namespace, key)?;
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!(".{key}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), bytes = value.len(), "Stored value");
        Ok(())
    }

    fn erase(&self, namespace: &str, key: &str) -> StoreResult<()> {
        let path = self.path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
