//! Integration tests for credential refresh: grace window and single-flight.

mod common;

use assert_matches::assert_matches;
use common::*;
use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use warden::application_port::{RefreshError, RefreshFailed};
use warden::domain_model::{Credential, RequestOutcome};
use warden::domain_port::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use warden::infra_http::{FakeReply, FakeTransport};

/// Delays every reply so overlapping callers really overlap.
struct SlowTransport(Arc<FakeTransport>);

#[async_trait::async_trait]
impl HttpTransport for SlowTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        self.0.send(request).await
    }
}

fn slow_harness() -> Harness {
    let transport = Arc::new(FakeTransport::new());
    harness_over(transport.clone(), Arc::new(SlowTransport(transport)))
}

// ---------------------------------------------------------------------------
// Test: grace window
// ---------------------------------------------------------------------------

/// Refresh is due strictly inside the last thirty seconds.
#[tokio::test]
async fn needs_refresh_follows_grace_window() {
    let h = harness();
    let lifecycle = &h.client.lifecycle;

    assert!(lifecycle.needs_refresh(&jwt_expiring_in(&h.clock, 29)));
    assert!(lifecycle.needs_refresh(&jwt_expiring_in(&h.clock, -5)));
    assert!(!lifecycle.needs_refresh(&jwt_expiring_in(&h.clock, 31)));
    assert!(!lifecycle.needs_refresh(&Credential::new("not-a-jwt")));
}

/// A fresh credential is handed back untouched.
#[tokio::test]
async fn ensure_fresh_keeps_valid_credential() {
    let h = harness();
    let credential = h.login_expiring_in(600).await;

    let fresh = h
        .client
        .lifecycle
        .ensure_fresh(credential.clone())
        .await
        .expect("no refresh needed");

    assert!(!fresh.refreshed);
    assert_eq!(fresh.credential, credential);
    assert!(h.transport.sent().is_empty());
}

/// A malformed refresh reply fails the refresh and clears the session.
#[tokio::test]
async fn malformed_refresh_reply_logs_out() {
    let h = harness();
    let credential = h.login_expiring_in(5).await;
    h.transport.respond(REFRESH, 200, r#"{"unexpected":true}"#);

    let result = h.client.lifecycle.ensure_fresh(credential).await;

    assert_matches!(result, Err(RefreshFailed(RefreshError::Malformed(_))));
    assert_eq!(h.client.session.credential().await, None);
}

/// An unreachable refresh endpoint surfaces as a transport failure.
#[tokio::test]
async fn unreachable_refresh_endpoint_is_transport_failure() {
    let h = harness();
    let credential = h.login_expiring_in(5).await;
    h.transport.enqueue(REFRESH, FakeReply::Fail(TransportError::Timeout));

    let result = h.client.lifecycle.refresh(&credential).await;

    assert_matches!(result, Err(RefreshFailed(RefreshError::Transport(TransportError::Timeout))));
}

/// `access_token` is accepted in place of `token`.
#[tokio::test]
async fn refresh_accepts_access_token_field() {
    let h = harness();
    let stale = h.login_expiring_in(5).await;
    let fresh = jwt_expiring_in(&h.clock, 3600);
    h.transport.respond(
        REFRESH,
        200,
        &serde_json::json!({ "access_token": fresh.as_str() }).to_string(),
    );

    let refreshed = h.client.lifecycle.refresh(&stale).await.expect("refresh");

    assert_eq!(refreshed, fresh);
    assert_eq!(h.client.session.credential().await, Some(fresh));
}

// ---------------------------------------------------------------------------
// Test: single-flight
// ---------------------------------------------------------------------------

/// Concurrent calls with a stale credential share one refresh.
#[tokio::test]
async fn concurrent_stale_calls_share_one_refresh() {
    let h = slow_harness();
    h.login_expiring_in(10).await;
    let fresh = jwt_expiring_in(&h.clock, 3600);
    h.transport.respond(REFRESH, 200, &refresh_body(&fresh));
    h.transport
        .always(LEADS, FakeReply::Respond(HttpResponse::new(200, r#"{"total":42}"#)));

    let calls = (0..5).map(|_| h.client.pipeline.get::<Value>("/leads", &[]));
    let outcomes: Vec<RequestOutcome<Value>> = join_all(calls).await;

    assert!(outcomes.iter().all(RequestOutcome::is_success));
    assert_eq!(h.transport.sent_to(REFRESH).len(), 1);
    assert_eq!(h.client.session.refresh_generation(), 1);
    assert_eq!(h.bearer_sent_to(LEADS), vec![fresh.bearer(); 5]);
}

/// Callers that join a failing refresh all see the failure.
#[tokio::test]
async fn joined_callers_share_refresh_failure() {
    let h = slow_harness();
    let stale = h.login_expiring_in(10).await;
    h.transport.respond(REFRESH, 401, "");

    let refreshes = (0..3).map(|_| h.client.lifecycle.refresh(&stale));
    let results = join_all(refreshes).await;

    for result in results {
        assert_matches!(result, Err(RefreshFailed(RefreshError::Rejected(401))));
    }
    assert_eq!(h.transport.sent_to(REFRESH).len(), 1);
    assert_eq!(h.client.session.credential().await, None);
}

/// Once a refresh settles, the next one starts fresh.
#[tokio::test]
async fn sequential_refreshes_each_hit_the_network() {
    let h = harness();
    let stale = h.login_expiring_in(10).await;
    h.transport.respond(REFRESH, 200, &refresh_body(&jwt_expiring_in(&h.clock, 600)));
    h.transport.respond(REFRESH, 200, &refresh_body(&jwt_expiring_in(&h.clock, 900)));

    h.client.lifecycle.refresh(&stale).await.expect("first refresh");
    h.client.lifecycle.refresh(&stale).await.expect("second refresh");

    assert_eq!(h.transport.sent_to(REFRESH).len(), 2);
    assert_eq!(h.client.session.refresh_generation(), 2);
}
