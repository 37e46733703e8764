use anyhow::{Result, anyhow};
use tracing::debug;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const BOOTSTRAP_FILTER: &str = "info";

pub struct LogConfig {
    pub filter: String,
}

/// Subscriber with a filter that can be swapped once settings are loaded.
///
/// `RUST_LOG` wins over both the bootstrap level and the settings file, so an
/// operator can raise verbosity without editing configuration.
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
}

impl Logger {
    /// Output goes to stderr; stdout is reserved for command results.
    pub fn new_bootstrap() -> Self {
        let directives = resolve_directives(BOOTSTRAP_FILTER, env_directives());
        let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();

        Self { reload_handle }
    }

    /// Applies the settings filter unless `RUST_LOG` overrides it. Returns the
    /// directives now in force.
    pub fn reload_from_config(&self, config: &LogConfig) -> Result<String> {
        let directives = resolve_directives(&config.filter, env_directives());
        let filter = EnvFilter::try_new(&directives).map_err(|e| anyhow!(e))?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        debug!(%directives, "log filter applied");
        Ok(directives)
    }
}

fn env_directives() -> Option<String> {
    std::env::var(EnvFilter::DEFAULT_ENV).ok()
}

fn resolve_directives(configured: &str, from_env: Option<String>) -> String {
    match from_env {
        Some(env) if !env.trim().is_empty() => env.trim().to_string(),
        _ if configured.trim().is_empty() => BOOTSTRAP_FILTER.to_string(),
        _ => configured.trim().to_string(),
    }
}
