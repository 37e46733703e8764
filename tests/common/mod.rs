//! Shared harness: a fully wired client over fakes.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::json;
use std::sync::Arc;
use warden::client::{Client, ClientConfig};
use warden::domain_model::Credential;
use warden::domain_port::{Clock, HttpRequest, HttpTransport};
use warden::infra_http::FakeTransport;
use warden::infra_local::{ManualClock, MemoryKvStore, RecordingNavigator};

pub const LEADS: &str = "/api/leads";
pub const REFRESH: &str = "/api/auth/refresh";
pub const ERROR_LOG: &str = "/api/logs/errors";
pub const ACCESS_LOG: &str = "/api/security/access-log";

pub struct Harness {
    pub client: Client,
    pub transport: Arc<FakeTransport>,
    pub store: Arc<MemoryKvStore>,
    pub clock: Arc<ManualClock>,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_772_366_400, 0).expect("valid timestamp")
}

pub fn harness() -> Harness {
    harness_with(Arc::new(FakeTransport::new()))
}

pub fn harness_with(transport: Arc<FakeTransport>) -> Harness {
    harness_over(transport.clone(), transport)
}

/// Builds a client whose HTTP goes through `wire`, while `transport` is the
/// fake used for scripting and inspection.
pub fn harness_over(transport: Arc<FakeTransport>, wire: Arc<dyn HttpTransport>) -> Harness {
    let store = Arc::new(MemoryKvStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let navigator = Arc::new(RecordingNavigator::new());
    let client = Client::assemble(
        store.clone(),
        wire,
        clock.clone(),
        navigator.clone(),
        ClientConfig {
            base_url: "http://gateway.test/api".to_string(),
            ..ClientConfig::default()
        },
    );
    Harness {
        client,
        transport,
        store,
        clock,
        navigator,
    }
}

/// HS256 token whose `exp` is `secs` after the harness clock's current time.
pub fn jwt_expiring_in(clock: &ManualClock, secs: i64) -> Credential {
    let exp = clock.now() + Duration::seconds(secs);
    let token = encode(
        &Header::new(Algorithm::HS256),
        &json!({ "sub": "agent-7", "exp": exp.timestamp() }),
        &EncodingKey::from_secret(b"gateway-secret"),
    )
    .expect("encode jwt");
    Credential::new(token)
}

pub fn refresh_body(credential: &Credential) -> String {
    json!({ "token": credential.as_str() }).to_string()
}

impl Harness {
    pub async fn login_expiring_in(&self, secs: i64) -> Credential {
        let credential = jwt_expiring_in(&self.clock, secs);
        self.client.session.login(&credential).await.expect("login");
        credential
    }

    pub fn bearer_sent_to(&self, path: &str) -> Vec<String> {
        self.transport
            .sent_to(path)
            .iter()
            .filter_map(|r| r.header_value("Authorization").map(str::to_owned))
            .collect()
    }
}

/// Gives detached telemetry tasks their turn on the test runtime. The fake
/// transport answers without awaiting, so each task finishes in one poll.
pub async fn run_detached() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Requests to `path` once at least `count` of them have been recorded.
pub async fn sent_eventually(
    transport: &FakeTransport,
    path: &str,
    count: usize,
) -> Vec<HttpRequest> {
    let wait = async {
        loop {
            let sent = transport.sent_to(path);
            if sent.len() >= count {
                return sent;
            }
            tokio::task::yield_now().await;
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(5), wait)
        .await
        .expect("requests recorded")
}
