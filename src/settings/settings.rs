use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api: Api,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub telemetry: Telemetry,
    #[serde(default)]
    pub block: Block,
    pub storage: Storage,
    pub log: Log,
}

#[derive(Debug, Deserialize)]
pub struct Api {
    pub base_url: String,
    pub auth_refresh_path: String,
    pub error_log_path: String,
    pub access_log_path: String,
    pub user_agent: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub grace_secs: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self { grace_secs: 30 }
    }
}

#[derive(Debug, Deserialize)]
pub struct Telemetry {
    pub security_throttle_ms: i64,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            security_throttle_ms: 2_000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Block {
    pub redirect_floor_secs: i64,
    pub default_duration_minutes: u32,
    pub blocked_destination: String,
    pub login_destination: String,
}

impl Default for Block {
    fn default() -> Self {
        Self {
            redirect_floor_secs: 5,
            default_duration_minutes: 15,
            blocked_destination: "/blocked".to_string(),
            login_destination: "/login".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "redis"
    #[serde(default)]
    pub redis_dsn: Option<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_prefix() -> String {
    "warden".to_string()
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then applies `WARDEN__SECTION__KEY` overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("WARDEN").prefix_separator("__").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_settings_parse() {
        let settings = parse_settings(Some("settings/dev.toml")).expect("dev settings");
        assert_eq!(settings.session.grace_secs, 30);
        assert_eq!(settings.telemetry.security_throttle_ms, 2_000);
        assert_eq!(settings.block.redirect_floor_secs, 5);
        assert_eq!(settings.storage.backend, "memory");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }
}
