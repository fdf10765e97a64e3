// Worker Configuration
//
// Configuration for the activity worker, loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::reliability::RetryPolicy;

/// Which job store backs the activities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local store; state is lost on exit
    Memory,
    /// PostgreSQL store at `DATABASE_URL`
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("unknown JOB_STORE '{other}', expected 'memory' or 'postgres'"),
        }
    }
}

/// Configuration for the activity worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store: StoreBackend,

    /// Required for [`StoreBackend::Postgres`]
    pub database_url: Option<String>,

    pub max_connections: u32,

    /// Retry envelope applied to every activity call
    pub retry: RetryPolicy,
}

impl WorkerConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `JOB_STORE`: `memory` or `postgres` (default: memory)
    /// - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
    /// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 5)
    /// - `ACTIVITY_MAX_ATTEMPTS`: deliveries per activity call (default: 5)
    /// - `ACTIVITY_INITIAL_INTERVAL_MS`: first re-delivery delay (default: 1000)
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store = var("JOB_STORE")
            .map(|v| v.parse())
            .transpose()?
            .unwrap_or(StoreBackend::Memory);

        let database_url = var("DATABASE_URL").filter(|v| !v.is_empty());
        if store == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when JOB_STORE=postgres");
        }

        let max_connections = parse_var(&var, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(5);
        let max_attempts = parse_var(&var, "ACTIVITY_MAX_ATTEMPTS")?.unwrap_or(5);
        let initial_interval_ms = parse_var(&var, "ACTIVITY_INITIAL_INTERVAL_MS")?.unwrap_or(1000);

        if max_attempts == 0 {
            bail!("ACTIVITY_MAX_ATTEMPTS must be at least 1");
        }

        let retry = RetryPolicy::exponential()
            .with_max_attempts(max_attempts)
            .with_initial_interval(Duration::from_millis(initial_interval_ms));

        Ok(Self {
            store,
            database_url,
            max_connections,
            retry,
        })
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|v| v.parse::<T>().with_context(|| format!("invalid {key}: '{v}'")))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(config(&[("JOB_STORE", "postgres")]).is_err());

        let config = config(&[
            ("JOB_STORE", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/syncflow"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(config.store, StoreBackend::Postgres);
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn test_retry_settings() {
        let config = config(&[
            ("ACTIVITY_MAX_ATTEMPTS", "3"),
            ("ACTIVITY_INITIAL_INTERVAL_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("JOB_STORE", "redis")]).is_err());
        assert!(config(&[("ACTIVITY_MAX_ATTEMPTS", "0")]).is_err());

        let err = config(&[("DATABASE_MAX_CONNECTIONS", "many")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }
}
