//! CredentialStore port - remote queue 用の認証情報
//!
//! identity（ユーザー ID や service account 名）から credentials を引き、
//! それを使って認可済みの transport を作ります。

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CredentialError, Credentials};
use crate::ports::RemoteTaskApi;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing usable is stored for `identity`.
    async fn resolve_credentials(&self, identity: &str) -> Result<Option<Credentials>, CredentialError>;

    async fn store_credentials(
        &self,
        identity: &str,
        credentials: &Credentials,
    ) -> Result<(), CredentialError>;

    /// Build a transport handle that carries `credentials` on every call.
    async fn authorize(&self, credentials: &Credentials) -> Result<Arc<dyn RemoteTaskApi>, CredentialError>;
}
