/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection URL (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 2)
/// - `RETENTION_DAYS`: Age after which soft-deleted tasks are purged (default: 30)
/// - `PURGE_INTERVAL_SECONDS`: Time between purge runs (default: 3600)
/// - `STORAGE_TIMEOUT_SECONDS`: Bound on each storage call (default: 30)

use anyhow::Context;
use std::{env, str::FromStr, time::Duration};
use tasknest_shared::{db::pool::DatabaseConfig, service::DEFAULT_RETENTION_DAYS};

/// Retention window and schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub retention_days: u32,
    pub interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            interval: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,
    pub retention: RetentionConfig,
    pub storage_timeout: Duration,
}

impl WorkerConfig {
    /// Loads configuration from the environment (and `.env` if present)
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let retention_days = parse_or(&lookup, "RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        let interval_seconds = parse_or(&lookup, "PURGE_INTERVAL_SECONDS", 3600u64)?;
        if interval_seconds == 0 {
            anyhow::bail!("PURGE_INTERVAL_SECONDS must be positive");
        }

        Ok(Self {
            database: DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 2u32)?,
                ..Default::default()
            },
            retention: RetentionConfig {
                retention_days,
                interval: Duration::from_secs(interval_seconds),
            },
            storage_timeout: Duration::from_secs(parse_or(
                &lookup,
                "STORAGE_TIMEOUT_SECONDS",
                30u64,
            )?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
