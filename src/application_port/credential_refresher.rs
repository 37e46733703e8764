use crate::domain_model::Credential;
use crate::domain_port::{KvStoreError, TransportError};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh rejected with status {0}")]
    Rejected(u16),
    #[error("refresh response malformed: {0}")]
    Malformed(String),
    #[error("refresh transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("credential store failed: {0}")]
    Store(String),
}

impl From<KvStoreError> for RefreshError {
    fn from(err: KvStoreError) -> Self {
        RefreshError::Store(err.to_string())
    }
}

/// Exchanges a stale credential for a new one at the auth endpoint.
#[async_trait::async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self, stale: &Credential) -> Result<Credential, RefreshError>;
}

/// Refresh failure as seen by callers; the session is already logged out.
#[derive(Debug, Clone, thiserror::Error)]
#[error("credential refresh failed: {0}")]
pub struct RefreshFailed(pub RefreshError);

#[derive(Debug, Clone)]
pub struct FreshCredential {
    pub credential: Credential,
    /// Whether obtaining this credential used up the call's refresh.
    pub refreshed: bool,
}
