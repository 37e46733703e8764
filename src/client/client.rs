use crate::application_impl::*;
use crate::application_port::CredentialRefresher;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_local::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use chrono::Duration;
use std::sync::Arc;

/// Everything the components need to know about the gateway and policies.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub auth_refresh_path: String,
    pub error_log_path: String,
    pub access_log_path: String,
    pub user_agent: String,
    pub grace: Duration,
    pub security_throttle: Duration,
    pub block_policy: BlockPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://gateway.local/api".to_string(),
            auth_refresh_path: "/auth/refresh".to_string(),
            error_log_path: "/logs/errors".to_string(),
            access_log_path: "/security/access-log".to_string(),
            user_agent: "warden/0.1".to_string(),
            grace: Duration::seconds(DEFAULT_GRACE_SECS),
            security_throttle: Duration::milliseconds(DEFAULT_SECURITY_THROTTLE_MS),
            block_policy: BlockPolicy::default(),
        }
    }
}

impl From<&Settings> for ClientConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            base_url: settings.api.base_url.clone(),
            auth_refresh_path: settings.api.auth_refresh_path.clone(),
            error_log_path: settings.api.error_log_path.clone(),
            access_log_path: settings.api.access_log_path.clone(),
            user_agent: settings.api.user_agent.clone(),
            grace: Duration::seconds(settings.session.grace_secs),
            security_throttle: Duration::milliseconds(settings.telemetry.security_throttle_ms),
            block_policy: BlockPolicy {
                redirect_floor: Duration::seconds(settings.block.redirect_floor_secs),
                default_duration_minutes: settings.block.default_duration_minutes,
            },
        }
    }
}

/// Composition root. Owns the single `Session` and wires it into every
/// component; nothing in the crate holds session state globally.
pub struct Client {
    pub session: Arc<Session>,
    pub lifecycle: Arc<TokenLifecycleManager>,
    pub telemetry: Arc<TelemetryEmitter>,
    pub blocks: Arc<BlockStateMachine>,
    pub pipeline: Arc<RequestPipeline>,
    pub route_tracker: RouteTracker,
    transport: Arc<dyn HttpTransport>,
    beacon_config: BeaconConfig,
}

impl Client {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let store: Arc<dyn KvStore> = match settings.storage.backend.as_str() {
            "memory" => Arc::new(MemoryKvStore::new()),
            "redis" => {
                let dsn = settings
                    .storage
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("storage.redis_dsn is required for redis"))?;
                Arc::new(RedisKvStore::connect(dsn, settings.storage.prefix.clone()).await?)
            }
            other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        };

        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
            std::time::Duration::from_millis(settings.api.timeout_ms),
        )?);
        let navigator: Arc<dyn Navigator> = Arc::new(TracingNavigator {
            blocked_destination: settings.block.blocked_destination.clone(),
            login_destination: settings.block.login_destination.clone(),
        });

        let client = Self::assemble(
            store,
            transport,
            Arc::new(SystemClock),
            navigator,
            ClientConfig::from(settings),
        );
        info!(
            backend = %settings.storage.backend,
            base_url = %settings.api.base_url,
            "client ready"
        );
        Ok(client)
    }

    pub fn assemble(
        store: Arc<dyn KvStore>,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
        config: ClientConfig,
    ) -> Self {
        let session = Arc::new(Session::new(store.clone()));

        let refresher: Arc<dyn CredentialRefresher> = Arc::new(HttpCredentialRefresher::new(
            transport.clone(),
            join_url(&config.base_url, &config.auth_refresh_path),
            config.user_agent.clone(),
        ));
        let lifecycle = Arc::new(TokenLifecycleManager::new(
            session.clone(),
            refresher,
            clock.clone(),
            config.grace,
        ));

        let telemetry = Arc::new(TelemetryEmitter::new(
            transport.clone(),
            clock.clone(),
            TelemetryConfig {
                base_url: config.base_url.clone(),
                error_log_path: config.error_log_path.clone(),
                access_log_path: config.access_log_path.clone(),
                security_throttle: config.security_throttle,
            },
        ));

        let blocks = Arc::new(BlockStateMachine::new(
            store,
            clock.clone(),
            navigator.clone(),
            config.block_policy.clone(),
        ));

        let pipeline = Arc::new(RequestPipeline::new(
            transport.clone(),
            session.clone(),
            lifecycle.clone(),
            telemetry.clone(),
            blocks.clone(),
            navigator,
            clock,
            PipelineConfig {
                base_url: config.base_url.clone(),
                user_agent: config.user_agent.clone(),
            },
        ));

        let beacon_config = BeaconConfig {
            base_url: config.base_url.clone(),
            access_log_path: config.access_log_path.clone(),
            user_agent: config.user_agent.clone(),
        };
        let route_tracker = RouteTracker::new(
            transport.clone(),
            blocks.clone(),
            session.clone(),
            beacon_config.clone(),
        );

        Self {
            session,
            lifecycle,
            telemetry,
            blocks,
            pipeline,
            route_tracker,
            transport,
            beacon_config,
        }
    }

    /// Tracker for one mount of a public page.
    pub fn public_page(&self, page: impl Into<String>) -> PublicPageTracker {
        PublicPageTracker::new(
            self.transport.clone(),
            self.blocks.clone(),
            self.session.clone(),
            self.beacon_config.clone(),
            page,
        )
    }
}
