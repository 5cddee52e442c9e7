//! InMemoryCredentialStore - identity → credentials JSON blob
//!
//! 値はシリアライズ済みの blob として保存します（読み出し時に decode）。
//! transport の生成は注入された factory に任せます。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::{CredentialError, Credentials};
use crate::ports::{CredentialStore, RemoteTaskApi};

/// Builds a transport handle for a set of credentials.
pub type TransportFactory = Arc<dyn Fn(&Credentials) -> Arc<dyn RemoteTaskApi> + Send + Sync>;

pub struct InMemoryCredentialStore {
    blobs: RwLock<HashMap<String, String>>,
    factory: TransportFactory,
}

impl InMemoryCredentialStore {
    pub fn new(factory: TransportFactory) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Store a raw blob as-is (used to simulate corrupted entries).
    pub async fn put_blob(&self, identity: impl Into<String>, blob: impl Into<String>) {
        self.blobs.write().await.insert(identity.into(), blob.into());
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn resolve_credentials(&self, identity: &str) -> Result<Option<Credentials>, CredentialError> {
        let blobs = self.blobs.read().await;
        let Some(blob) = blobs.get(identity) else {
            debug!(identity, "no credentials stored");
            return Ok(None);
        };
        let credentials = Credentials::from_blob(blob);
        if credentials.is_none() && !blob.trim().is_empty() {
            warn!(identity, "stored credentials could not be decoded");
        }
        Ok(credentials)
    }

    async fn store_credentials(
        &self,
        identity: &str,
        credentials: &Credentials,
    ) -> Result<(), CredentialError> {
        self.blobs
            .write()
            .await
            .insert(identity.to_string(), credentials.to_blob());
        Ok(())
    }

    async fn authorize(&self, credentials: &Credentials) -> Result<Arc<dyn RemoteTaskApi>, CredentialError> {
        if credentials.invalid {
            return Err(CredentialError::Invalid("revoked grant".into()));
        }
        Ok((self.factory)(credentials))
    }
}
