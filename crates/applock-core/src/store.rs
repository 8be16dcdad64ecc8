//! Credential store interface and backends
//!
//! The guard only ever needs get/upsert keyed by principal id. Backends:
//! - [`MemoryCredentialStore`] for tests and embedding
//! - [`FileCredentialStore`], a JSON map written atomically with 0600 permissions

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::credential::StoredCredential;
use crate::error::StoreError;
use crate::types::PrincipalId;

/// Remote credential store, one record per principal
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the credential for `principal`, if one exists
    async fn get(&self, principal: &PrincipalId) -> Result<Option<StoredCredential>, StoreError>;

    /// Insert or overwrite the credential for `principal`
    async fn upsert(
        &self,
        principal: &PrincipalId,
        credential: StoredCredential,
    ) -> Result<(), StoreError>;
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<PrincipalId, StoredCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, principal: &PrincipalId) -> Result<Option<StoredCredential>, StoreError> {
        Ok(self.records.read().await.get(principal).cloned())
    }

    async fn upsert(
        &self,
        principal: &PrincipalId,
        credential: StoredCredential,
    ) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(principal.clone(), credential);
        Ok(())
    }
}

/// Credential store persisted as a single JSON file
///
/// Writes are serialized through an async lock and land via temp-file rename.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<PrincipalId, StoredCredential>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(
        &self,
        records: &HashMap<PrincipalId, StoredCredential>,
    ) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(records)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, principal: &PrincipalId) -> Result<Option<StoredCredential>, StoreError> {
        Ok(self.load().await?.remove(principal))
    }

    async fn upsert(
        &self,
        principal: &PrincipalId,
        credential: StoredCredential,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        records.insert(principal.clone(), credential);
        self.save(&records).await?;
        tracing::debug!(principal = %principal, "Saved credential to {:?}", self.path);
        Ok(())
    }
}
