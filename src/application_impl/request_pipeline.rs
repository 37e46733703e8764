use crate::application_impl::{
    BlockStateMachine, Session, TelemetryEmitter, TokenLifecycleManager, join_url,
};
use crate::domain_model::{
    AccessReport, ApiRequest, Credential, Destination, Enforcement, ErrorReport, Method,
    RequestOutcome,
};
use crate::domain_port::{
    Clock, HttpRequest, HttpResponse, HttpTransport, Navigator, TransportError,
};
use crate::logger::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

const NETWORK_DIAGNOSTIC_LEN: usize = 80;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub user_agent: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Runs one logical call against the gateway: block check, credential,
/// send, a single refresh-and-retry on 401, classification, telemetry.
///
/// Never fails: every path ends in a [`RequestOutcome`]. At most two HTTP
/// attempts and one refresh are made per call.
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    session: Arc<Session>,
    lifecycle: Arc<TokenLifecycleManager>,
    telemetry: Arc<TelemetryEmitter>,
    blocks: Arc<BlockStateMachine>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl RequestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        session: Arc<Session>,
        lifecycle: Arc<TokenLifecycleManager>,
        telemetry: Arc<TelemetryEmitter>,
        blocks: Arc<BlockStateMachine>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            transport,
            session,
            lifecycle,
            telemetry,
            blocks,
            navigator,
            clock,
            config,
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> RequestOutcome<T> {
        let mut request = ApiRequest::new(Method::Get, endpoint);
        for (key, value) in params {
            request = request.param(*key, *value);
        }
        self.call(request).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
    ) -> RequestOutcome<T> {
        self.call(ApiRequest::new(Method::Post, endpoint).body(body)).await
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
    ) -> RequestOutcome<T> {
        self.call(ApiRequest::new(Method::Put, endpoint).body(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> RequestOutcome<T> {
        self.call(ApiRequest::new(Method::Delete, endpoint)).await
    }

    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> RequestOutcome<T> {
        if let Enforcement::Redirected(record) = self.blocks.enforce().await {
            return RequestOutcome::Blocked(record);
        }

        let Some(credential) = self.session.credential().await else {
            debug!(endpoint = %request.endpoint, "no credential, not sending");
            return self.auth_expired(false).await;
        };

        // A failed refresh has already cleared the session.
        let fresh = match self.lifecycle.ensure_fresh(credential).await {
            Ok(fresh) => fresh,
            Err(_) => return self.auth_expired(false).await,
        };
        let mut credential = fresh.credential;

        self.telemetry.report_access(
            AccessReport {
                endpoint: request.endpoint.clone(),
                method: request.method,
                user_agent: self.config.user_agent.clone(),
                status_code: None,
                response_ms: None,
            },
            Some(&credential),
        );

        let mut response = match self.send(&request, &credential).await {
            Ok(response) => response,
            Err(e) => return self.network_error(&request, &credential, e),
        };

        if response.status == 401 {
            if fresh.refreshed {
                warn!(endpoint = %request.endpoint, "401 with a just-refreshed credential");
                return self.auth_expired(true).await;
            }
            credential = match self.lifecycle.refresh(&credential).await {
                Ok(credential) => credential,
                Err(_) => return self.auth_expired(false).await,
            };

            info!(endpoint = %request.endpoint, "retrying once with refreshed credential");
            response = match self.send(&request, &credential).await {
                Ok(retry) if retry.status == 401 => return self.auth_expired(true).await,
                Ok(retry) => retry,
                Err(e) => return self.network_error(&request, &credential, e),
            };
        }

        self.classify(&request, &credential, response).await
    }

    async fn send(
        &self,
        request: &ApiRequest,
        credential: &Credential,
    ) -> Result<HttpResponse, TransportError> {
        let url = join_url(&self.config.base_url, &request.endpoint);
        let mut http = HttpRequest::new(request.method, url)
            .header("Authorization", credential.bearer())
            .header("User-Agent", &self.config.user_agent)
            .header("Accept", "application/json");
        http.query = request.params.clone();
        http.body = request.body.clone();
        self.transport.send(http).await
    }

    async fn classify<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        credential: &Credential,
        response: HttpResponse,
    ) -> RequestOutcome<T> {
        if let Some(verdict) = self.blocks.verdict_in(response.status, &response.body) {
            let record = self.blocks.record_verdict(&verdict).await;
            return RequestOutcome::Blocked(record);
        }

        if !response.is_success() {
            let message = error_message(response.status, &response.body);
            self.report_error(request, Some(response.status), &message, "remote", credential);
            return RequestOutcome::RemoteError {
                status: response.status,
                message,
            };
        }

        match serde_json::from_str::<T>(&response.body) {
            Ok(payload) => RequestOutcome::Success(Some(payload)),
            Err(e) => {
                debug!(endpoint = %request.endpoint, error = %e, "2xx without a usable payload");
                RequestOutcome::Success(None)
            }
        }
    }

    async fn auth_expired<T>(&self, clear_session: bool) -> RequestOutcome<T> {
        if clear_session {
            if let Err(e) = self.session.logout().await {
                warn!(error = %e, "session not cleared");
            }
        }
        self.navigator.redirect(Destination::Login);
        RequestOutcome::AuthExpired
    }

    fn network_error<T>(
        &self,
        request: &ApiRequest,
        credential: &Credential,
        error: TransportError,
    ) -> RequestOutcome<T> {
        let diagnostic: String = error.to_string().chars().take(NETWORK_DIAGNOSTIC_LEN).collect();
        warn!(endpoint = %request.endpoint, error = %diagnostic, "request did not complete");
        self.report_error(request, None, &diagnostic, "network", credential);
        RequestOutcome::NetworkError {
            message: format!("Network error, please check your connection ({diagnostic})"),
        }
    }

    fn report_error(
        &self,
        request: &ApiRequest,
        status: Option<u16>,
        message: &str,
        context: &str,
        credential: &Credential,
    ) {
        self.telemetry.report_error(
            ErrorReport {
                endpoint: request.endpoint.clone(),
                method: request.method,
                status,
                message: message.to_owned(),
                context: context.to_owned(),
                occurred_at: self.clock.now(),
            },
            Some(credential),
        );
    }
}

fn error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| format!("Request failed with status {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_server_text() {
        assert_eq!(error_message(422, r#"{"error":"name required"}"#), "name required");
    }

    #[test]
    fn error_message_falls_back_to_status() {
        assert_eq!(
            error_message(502, "<html>bad gateway</html>"),
            "Request failed with status 502"
        );
        assert_eq!(error_message(500, r#"{"message":"x"}"#), "Request failed with status 500");
    }
}
