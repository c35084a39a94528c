//! Daemon configuration, read from `STELLA_*` environment variables

use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.stella/jobs.db";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 8787;
const DEFAULT_EXECUTOR_URL: &str = "http://127.0.0.1:8788/run";
const DEFAULT_EXECUTOR_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MISSION_LOCK_TTL_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Daemon settings
///
/// One daemon owns a database file. Startup recovery requeues every active
/// job, so a second daemon on the same file would steal running work.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: String,
    pub redis_url: String,
    pub http_host: String,
    pub http_port: u16,
    pub executor_url: String,
    pub executor_timeout: Duration,
    pub debug_locks: bool,
    pub mission_lock_ttl_ms: u64,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and empty values take the default
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = get("STELLA_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let mission_lock_ttl_ms = parse_or(&get, "STELLA_MISSION_LOCK_TTL_MS", DEFAULT_MISSION_LOCK_TTL_MS)?;
        if mission_lock_ttl_ms == 0 {
            anyhow::bail!("STELLA_MISSION_LOCK_TTL_MS must be greater than zero");
        }

        Ok(Self {
            db_path: shellexpand::tilde(&db_path).into_owned(),
            redis_url: get("STELLA_REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            http_host: get("STELLA_HTTP_HOST").unwrap_or_else(|| DEFAULT_HTTP_HOST.to_string()),
            http_port: parse_or(&get, "STELLA_HTTP_PORT", DEFAULT_HTTP_PORT)?,
            executor_url: get("STELLA_EXECUTOR_URL")
                .unwrap_or_else(|| DEFAULT_EXECUTOR_URL.to_string()),
            executor_timeout: Duration::from_secs(parse_or(
                &get,
                "STELLA_EXECUTOR_TIMEOUT_SECS",
                DEFAULT_EXECUTOR_TIMEOUT_SECS,
            )?),
            debug_locks: get("STELLA_DEBUG_LOCKS").is_some_and(|v| is_truthy(&v)),
            mission_lock_ttl_ms,
            log_format: match get("STELLA_LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
