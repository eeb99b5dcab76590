use std::str::FromStr;
use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use chrono_tz::Tz;

use crate::engine::EngineConfig;

/// `DATABASE_URL` value that selects the in-process summary store.
pub const MEMORY_DATABASE: &str = "memory";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or values are inconsistent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub topics_path: String,
    pub port: u16,
    pub rust_log: String,
    pub timezone: Tz,
    pub provider_timeout_ms: u64,
    pub retry_cooldown_s: u64,
    pub max_attempts_per_day: i32,
    pub lease_ttl_s: u64,
    pub pending_wait_ms: u64,
    /// Zero disables the pre-warm job.
    pub prewarm_interval_s: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let timezone_name = lookup("DIGEST_TIMEZONE").unwrap_or_else(|| "UTC".to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("DIGEST_TIMEZONE '{timezone_name}' is invalid: {e}"))?;

        let config = Config {
            database_url: require("DATABASE_URL")?,
            anthropic_api_key: require("ANTHROPIC_API_KEY")?,
            topics_path: lookup("TOPICS_PATH")
                .unwrap_or_else(|| "config/topics.json".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            timezone,
            provider_timeout_ms: parse_or(&lookup, "PROVIDER_TIMEOUT_MS", 60_000)?,
            retry_cooldown_s: parse_or(&lookup, "RETRY_COOLDOWN_S", 300)?,
            max_attempts_per_day: parse_or(&lookup, "MAX_ATTEMPTS_PER_DAY", 3)?,
            lease_ttl_s: parse_or(&lookup, "LEASE_TTL_S", 120)?,
            pending_wait_ms: parse_or(&lookup, "PENDING_WAIT_MS", 0)?,
            prewarm_interval_s: parse_or(&lookup, "PREWARM_INTERVAL_S", 0)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts_per_day < 1 {
            bail!("MAX_ATTEMPTS_PER_DAY must be at least 1");
        }
        if self.provider_timeout_ms == 0 {
            bail!("PROVIDER_TIMEOUT_MS must be positive");
        }
        // A holder must finish its provider call before anyone can reclaim the lease.
        if self.lease_ttl_s.saturating_mul(1000) <= self.provider_timeout_ms {
            bail!(
                "LEASE_TTL_S ({}s) must exceed PROVIDER_TIMEOUT_MS ({}ms)",
                self.lease_ttl_s,
                self.provider_timeout_ms
            );
        }
        self.engine_config()?;
        Ok(())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            timezone: self.timezone,
            provider_timeout: StdDuration::from_millis(self.provider_timeout_ms),
            retry_cooldown: seconds("RETRY_COOLDOWN_S", self.retry_cooldown_s)?,
            max_attempts_per_day: self.max_attempts_per_day,
            lease_ttl: seconds("LEASE_TTL_S", self.lease_ttl_s)?,
            pending_wait: StdDuration::from_millis(self.pending_wait_ms),
            ..EngineConfig::default()
        })
    }
}

fn seconds(key: &str, value: u64) -> Result<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .with_context(|| format!("{key} is out of range: {value}"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} must be a valid number, got '{raw}': {e}")),
    }
}
