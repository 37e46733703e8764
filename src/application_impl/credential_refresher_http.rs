use crate::application_port::{CredentialRefresher, RefreshError};
use crate::domain_model::{Credential, Method};
use crate::domain_port::{HttpRequest, HttpTransport};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    token: String,
}

/// Refreshes against `POST <refresh_url>` with the stale credential as bearer.
pub struct HttpCredentialRefresher {
    transport: Arc<dyn HttpTransport>,
    refresh_url: String,
    user_agent: String,
}

impl HttpCredentialRefresher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        refresh_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            refresh_url: refresh_url.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait::async_trait]
impl CredentialRefresher for HttpCredentialRefresher {
    async fn refresh(&self, stale: &Credential) -> Result<Credential, RefreshError> {
        let request = HttpRequest::new(Method::Post, &self.refresh_url)
            .header("Authorization", stale.bearer())
            .header("User-Agent", &self.user_agent);

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(RefreshError::Rejected(response.status));
        }

        let parsed: RefreshResponse = serde_json::from_str(&response.body)
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;
        if parsed.token.is_empty() {
            return Err(RefreshError::Malformed("empty token".to_string()));
        }
        Ok(Credential::new(parsed.token))
    }
}
