use crate::application_impl::{BlockStateMachine, Session, join_url};
use crate::domain_model::{Credential, Dispatch, Enforcement, Method, PageView, SkipReason};
use crate::domain_port::{HttpRequest, HttpTransport};
use crate::logger::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct BeaconConfig {
    pub base_url: String,
    pub access_log_path: String,
    pub user_agent: String,
}

/// Sends page-view beacons and feeds any verdict in the reply back into the
/// block state machine.
#[derive(Clone)]
struct Beacon {
    transport: Arc<dyn HttpTransport>,
    blocks: Arc<BlockStateMachine>,
    config: BeaconConfig,
}

impl Beacon {
    fn fire(
        &self,
        path: &str,
        exclude_from_rate_limit: bool,
        credential: Option<&Credential>,
    ) -> Dispatch {
        let view = PageView {
            endpoint: path.to_owned(),
            method: Method::Get,
            user_agent: self.config.user_agent.clone(),
            page_view: true,
            exclude_from_rate_limit,
        };
        let mut request = HttpRequest::new(
            Method::Post,
            join_url(&self.config.base_url, &self.config.access_log_path),
        )
        .header("User-Agent", &self.config.user_agent);
        request.body = serde_json::to_value(&view).ok();
        if let Some(credential) = credential {
            request = request.header("Authorization", credential.bearer());
        }

        let transport = self.transport.clone();
        let blocks = self.blocks.clone();
        Dispatch::Sent(tokio::spawn(async move {
            match transport.send(request).await {
                Ok(response) => {
                    if let Some(verdict) = blocks.verdict_in(response.status, &response.body) {
                        blocks.record_verdict(&verdict).await;
                    }
                }
                Err(e) => debug!(error = %e, "page view beacon failed"),
            }
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Proceed,
    Blocked,
}

/// Runs on every authenticated route change.
///
/// Its beacons ask the detector to exclude them from rate counting, so
/// ordinary navigation can never trigger a block by itself.
pub struct RouteTracker {
    beacon: Beacon,
    session: Arc<Session>,
}

impl RouteTracker {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        blocks: Arc<BlockStateMachine>,
        session: Arc<Session>,
        config: BeaconConfig,
    ) -> Self {
        Self {
            beacon: Beacon {
                transport,
                blocks,
                config,
            },
            session,
        }
    }

    pub async fn on_navigate(&self, path: &str) -> (NavigationOutcome, Dispatch) {
        if let Enforcement::Redirected(_) = self.beacon.blocks.enforce().await {
            return (
                NavigationOutcome::Blocked,
                Dispatch::Skipped(SkipReason::Blocked),
            );
        }
        let Some(credential) = self.session.credential().await else {
            return (
                NavigationOutcome::Proceed,
                Dispatch::Skipped(SkipReason::NoCredential),
            );
        };
        let dispatch = self.beacon.fire(path, true, Some(&credential));
        (NavigationOutcome::Proceed, dispatch)
    }
}

/// One per mounted public page. Fires its beacon at most once, counted
/// toward abuse detection.
pub struct PublicPageTracker {
    beacon: Beacon,
    session: Arc<Session>,
    page: String,
    fired: AtomicBool,
}

impl PublicPageTracker {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        blocks: Arc<BlockStateMachine>,
        session: Arc<Session>,
        config: BeaconConfig,
        page: impl Into<String>,
    ) -> Self {
        Self {
            beacon: Beacon {
                transport,
                blocks,
                config,
            },
            session,
            page: page.into(),
            fired: AtomicBool::new(false),
        }
    }

    pub async fn on_mount(&self) -> (NavigationOutcome, Dispatch) {
        if let Enforcement::Redirected(_) = self.beacon.blocks.enforce().await {
            return (
                NavigationOutcome::Blocked,
                Dispatch::Skipped(SkipReason::Blocked),
            );
        }
        if self.fired.swap(true, Ordering::AcqRel) {
            return (
                NavigationOutcome::Proceed,
                Dispatch::Skipped(SkipReason::AlreadyFired),
            );
        }
        let credential = self.session.credential().await;
        let dispatch = self.beacon.fire(&self.page, false, credential.as_ref());
        (NavigationOutcome::Proceed, dispatch)
    }
}
