//! Integration tests for the route and public-page trackers.

mod common;

use assert_matches::assert_matches;
use common::*;
use warden::application_impl::NavigationOutcome;
use warden::domain_model::{BlockState, BlockVerdict, Destination, Dispatch, SkipReason};

// ---------------------------------------------------------------------------
// Test: route tracker
// ---------------------------------------------------------------------------

/// Authenticated navigation sends a page view excluded from rate counting.
#[tokio::test]
async fn route_change_sends_excluded_page_view() {
    let h = harness();
    let credential = h.login_expiring_in(3600).await;

    let (outcome, dispatch) = h.client.route_tracker.on_navigate("/dashboard").await;
    dispatch.settled().await;

    assert_eq!(outcome, NavigationOutcome::Proceed);
    let beacons = h.transport.sent_to(ACCESS_LOG);
    assert_eq!(beacons.len(), 1);
    let view = beacons[0].body.clone().expect("page view body");
    assert_eq!(view["endpoint"], "/dashboard");
    assert_eq!(view["page_view"], true);
    assert_eq!(view["exclude_from_rate_limit"], true);
    assert_eq!(
        beacons[0].header_value("Authorization"),
        Some(credential.bearer().as_str())
    );
}

/// Every route change is reported; the security-lane throttle does not apply.
#[tokio::test]
async fn route_changes_are_not_throttled() {
    let h = harness();
    h.login_expiring_in(3600).await;

    for path in ["/dashboard", "/leads", "/settings"] {
        let (_, dispatch) = h.client.route_tracker.on_navigate(path).await;
        dispatch.settled().await;
    }

    assert_eq!(h.transport.sent_to(ACCESS_LOG).len(), 3);
}

/// Without a session no beacon is sent.
#[tokio::test]
async fn route_change_without_session_sends_nothing() {
    let h = harness();

    let (outcome, dispatch) = h.client.route_tracker.on_navigate("/dashboard").await;

    assert_eq!(outcome, NavigationOutcome::Proceed);
    assert_matches!(dispatch, Dispatch::Skipped(SkipReason::NoCredential));
    assert!(h.transport.sent().is_empty());
}

/// Under an active block navigation is redirected and nothing is sent.
#[tokio::test]
async fn route_change_under_block_redirects() {
    let h = harness();
    h.login_expiring_in(3600).await;
    h.client
        .blocks
        .record_verdict(&BlockVerdict {
            rule_id: "burst-read".to_string(),
            duration_minutes: 15,
        })
        .await;

    let (outcome, dispatch) = h.client.route_tracker.on_navigate("/dashboard").await;

    assert_eq!(outcome, NavigationOutcome::Blocked);
    assert_matches!(dispatch, Dispatch::Skipped(SkipReason::Blocked));
    assert!(h.transport.sent().is_empty());
    assert_eq!(h.navigator.count(Destination::Blocked), 2);
}

// ---------------------------------------------------------------------------
// Test: public page tracker
// ---------------------------------------------------------------------------

/// A public page reports once per mount, counted toward abuse detection,
/// even without a session.
#[tokio::test]
async fn public_page_reports_once_per_mount() {
    let h = harness();
    let tracker = h.client.public_page("/pricing");

    let (_, first) = tracker.on_mount().await;
    first.settled().await;
    let (outcome, second) = tracker.on_mount().await;

    assert_eq!(outcome, NavigationOutcome::Proceed);
    assert_matches!(second, Dispatch::Skipped(SkipReason::AlreadyFired));
    let beacons = h.transport.sent_to(ACCESS_LOG);
    assert_eq!(beacons.len(), 1);
    let view = beacons[0].body.clone().expect("page view body");
    assert_eq!(view["endpoint"], "/pricing");
    assert_eq!(view["exclude_from_rate_limit"], false);
    assert_eq!(beacons[0].header_value("Authorization"), None);

    let remount = h.client.public_page("/pricing");
    remount.on_mount().await.1.settled().await;
    assert_eq!(h.transport.sent_to(ACCESS_LOG).len(), 2);
}

/// A verdict in the beacon reply is recorded like any other.
#[tokio::test]
async fn verdict_in_beacon_reply_blocks() {
    let h = harness();
    h.transport.respond(
        ACCESS_LOG,
        429,
        r#"{"status":"blocked","rule":"page-flood","duration":10}"#,
    );

    let (_, dispatch) = h.client.public_page("/pricing").on_mount().await;
    dispatch.settled().await;

    let state = h.client.blocks.state().await;
    let record = assert_matches!(state, BlockState::Blocked(record) => record);
    assert_eq!(record.rule_id, "page-flood");
    assert_eq!(record.duration_minutes, 10);
    assert_eq!(h.navigator.count(Destination::Blocked), 1);
}
