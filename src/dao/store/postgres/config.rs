use std::time::Duration;

/// Default upper bound on pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// How long a request waits for a pooled connection before failing.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration describing how to reach Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PostgresConfig {
    /// Construct a configuration from an explicit connection string.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Build a configuration from `DATABASE_URL`, returning `None` when it is unset or blank.
    ///
    /// `DATABASE_MAX_CONNECTIONS` optionally overrides the pool size.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())?;

        let mut config = Self::new(url);
        if let Some(max) = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|max| *max > 0)
        {
            config.max_connections = max;
        }
        Some(config)
    }
}
