use crate::domain_model::Method;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Error-lane payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub endpoint: String,
    pub method: Method,
    pub status: Option<u16>,
    pub message: String,
    pub context: String,
    pub occurred_at: DateTime<Utc>,
}

/// Security-lane payload consumed by the remote abuse detector.
#[derive(Debug, Clone, Serialize)]
pub struct AccessReport {
    pub endpoint: String,
    pub method: Method,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ms: Option<u64>,
}

/// Navigation beacon sent by the route and public-page trackers.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub endpoint: String,
    pub method: Method,
    pub user_agent: String,
    pub page_view: bool,
    /// Asks the detector not to count this beacon toward its rate limits.
    pub exclude_from_rate_limit: bool,
}

/// Whether a fire-and-forget report left the process.
#[derive(Debug)]
pub enum Dispatch {
    Sent(tokio::task::JoinHandle<()>),
    Skipped(SkipReason),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent(_))
    }

    /// Waits for the background report to finish. One-shot commands call this
    /// before exiting so the report is not cut off.
    pub async fn settled(self) {
        if let Dispatch::Sent(handle) = self {
            let _ = handle.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SelfReference,
    Inflight,
    Throttled,
    NoCredential,
    Blocked,
    AlreadyFired,
}
