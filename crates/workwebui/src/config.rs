use std::time::Duration;

use crate::api::auth::TokenScope;
use crate::error::ErrorStatusMode;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5040";

/// Runtime configuration for the webui service, loaded from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: String,
    /// `None` means `stop()` waits for in-flight requests without bound.
    pub shutdown_timeout: Option<Duration>,
    pub api_token: Option<String>,
    pub token_scope: TokenScope,
    pub error_status: ErrorStatusMode,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, `std::env::var` in production.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
        let get_or = |primary: &str, fallback: &str| get(primary).or_else(|| get(fallback));

        let database_url =
            get("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL is missing"))?;

        let listen_addr = get_or("WEBUI_LISTEN_ADDR", "LISTEN_ADDR")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let shutdown_timeout = match get("WEBUI_SHUTDOWN_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => None,
        };

        let api_token = get_or("WEBUI_API_TOKEN", "API_TOKEN").map(|s| s.trim().to_string());

        let token_scope = match get("WEBUI_TOKEN_SCOPE") {
            Some(raw) => raw.parse()?,
            None => TokenScope::All,
        };

        let error_status = if get("WEBUI_CLIENT_ERRORS_AS_4XX").is_some_and(|v| truthy(&v)) {
            ErrorStatusMode::Classified
        } else {
            ErrorStatusMode::Legacy
        };

        let migrate_on_startup = get("WEBUI_MIGRATE_ON_STARTUP").is_some_and(|v| truthy(&v));

        Ok(Self {
            database_url,
            listen_addr,
            shutdown_timeout,
            api_token,
            token_scope,
            error_status,
            migrate_on_startup,
        })
    }
}

fn truthy(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_timeout(raw: &str) -> anyhow::Result<Option<Duration>> {
    let v = raw.trim().to_lowercase();
    if matches!(v.as_str(), "0" | "off" | "none" | "false") {
        return Ok(None);
    }

    let secs: u64 = v
        .parse()
        .map_err(|e| anyhow::anyhow!("WEBUI_SHUTDOWN_TIMEOUT_SECS={raw:?}: {e}"))?;
    Ok(Some(Duration::from_secs(secs)))
}
