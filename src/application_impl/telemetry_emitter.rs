use crate::domain_model::{AccessReport, Credential, Dispatch, ErrorReport, Method, SkipReason};
use crate::domain_port::{Clock, HttpRequest, HttpTransport};
use crate::logger::*;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_SECURITY_THROTTLE_MS: i64 = 2_000;

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub base_url: String,
    pub error_log_path: String,
    pub access_log_path: String,
    pub security_throttle: Duration,
}

/// Fire-and-forget reporting on two lanes.
///
/// Each lane has its own inflight flag; a report arriving while its lane is
/// busy is dropped, not queued. Reports run as detached tasks and every
/// failure is swallowed there, so nothing here can change the outcome of the
/// call being reported on.
pub struct TelemetryEmitter {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    config: TelemetryConfig,
    error_inflight: Arc<AtomicBool>,
    security_inflight: Arc<AtomicBool>,
    last_security_dispatch: Mutex<Option<DateTime<Utc>>>,
}

/// Holds a lane's inflight flag; released on drop, including on task abort.
struct InflightGuard(Arc<AtomicBool>);

impl InflightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TelemetryEmitter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        config: TelemetryConfig,
    ) -> Self {
        Self {
            transport,
            clock,
            config,
            error_inflight: Arc::new(AtomicBool::new(false)),
            security_inflight: Arc::new(AtomicBool::new(false)),
            last_security_dispatch: Mutex::new(None),
        }
    }

    pub fn is_access_log_endpoint(&self, endpoint: &str) -> bool {
        same_endpoint(endpoint, &self.config.access_log_path)
    }

    pub fn is_error_log_endpoint(&self, endpoint: &str) -> bool {
        same_endpoint(endpoint, &self.config.error_log_path)
    }

    pub fn report_error(&self, report: ErrorReport, credential: Option<&Credential>) -> Dispatch {
        if self.is_error_log_endpoint(&report.endpoint) {
            return skipped("error", SkipReason::SelfReference);
        }
        let Some(guard) = InflightGuard::acquire(&self.error_inflight) else {
            return skipped("error", SkipReason::Inflight);
        };

        let request = self.build(&self.config.error_log_path, &report, credential);
        Dispatch::Sent(self.spawn("error", guard, request))
    }

    pub fn report_access(&self, report: AccessReport, credential: Option<&Credential>) -> Dispatch {
        if self.is_access_log_endpoint(&report.endpoint) {
            return skipped("security", SkipReason::SelfReference);
        }
        let Some(guard) = InflightGuard::acquire(&self.security_inflight) else {
            return skipped("security", SkipReason::Inflight);
        };

        {
            let mut last = self
                .last_security_dispatch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let now = self.clock.now();
            if let Some(previous) = *last {
                if now - previous < self.config.security_throttle {
                    return skipped("security", SkipReason::Throttled);
                }
            }
            if credential.is_none() {
                return skipped("security", SkipReason::NoCredential);
            }
            *last = Some(now);
        }

        let request = self.build(&self.config.access_log_path, &report, credential);
        Dispatch::Sent(self.spawn("security", guard, request))
    }

    fn build<T: serde::Serialize>(
        &self,
        path: &str,
        payload: &T,
        credential: Option<&Credential>,
    ) -> HttpRequest {
        let mut request = HttpRequest::new(Method::Post, join_url(&self.config.base_url, path));
        request.body = serde_json::to_value(payload).ok();
        if let Some(credential) = credential {
            request = request.header("Authorization", credential.bearer());
        }
        request
    }

    fn spawn(
        &self,
        lane: &'static str,
        guard: InflightGuard,
        request: HttpRequest,
    ) -> tokio::task::JoinHandle<()> {
        let transport = self.transport.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match transport.send(request).await {
                Ok(response) if response.is_success() => trace!(lane, "telemetry delivered"),
                Ok(response) => debug!(lane, status = response.status, "telemetry rejected"),
                Err(e) => debug!(lane, error = %e, "telemetry transport failed"),
            }
        })
    }
}

fn skipped(lane: &'static str, reason: SkipReason) -> Dispatch {
    trace!(lane, ?reason, "telemetry skipped");
    Dispatch::Skipped(reason)
}

pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Compares endpoint paths ignoring query strings and surrounding slashes.
fn same_endpoint(a: &str, b: &str) -> bool {
    fn normalize(path: &str) -> &str {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        path.trim_matches('/')
    }
    normalize(a).eq_ignore_ascii_case(normalize(b))
}
