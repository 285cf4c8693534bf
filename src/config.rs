//! Broker connection configuration
//!
//! Loaded once at startup and injected into the broker client. Nothing here
//! is mutable after construction.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | DATABIN_BROKER_URL | - (required) | Broker SQL endpoint, e.g. `https://broker.example/query/sql` |
//! | DATABIN_AUTH_TOKEN | - (required) | Bearer token sent with every query |
//! | DATABIN_DATABASE | - (required) | Tenant selector sent as the `database` header |
//! | DATABIN_REQUEST_TIMEOUT_MS | 10000 | Per-call HTTP timeout |
//! | DATABIN_CONNECT_TIMEOUT_MS | 5000 | TCP + TLS connect timeout |
//! | DATABIN_OVERALL_TIMEOUT_MS | 30000 | Upper bound for one fan-out join |
//! | DATABIN_POOL_MAX_IDLE | 16 | Idle pooled connections kept per host |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_MAX_IDLE: usize = 16;

/// Broker endpoint, credentials and timeouts
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    /// Broker SQL endpoint URL
    pub broker_url: String,
    /// Bearer token (never logged)
    pub auth_token: String,
    /// Tenant / database selector header value
    pub database: String,
    /// Timeout for one HTTP call
    #[serde(rename = "request_timeout_ms", with = "duration_millis", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Timeout for establishing a connection
    #[serde(rename = "connect_timeout_ms", with = "duration_millis", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Timeout for a whole fan-out join
    #[serde(rename = "overall_timeout_ms", with = "duration_millis", default = "default_overall_timeout")]
    pub overall_timeout: Duration,
    /// Idle connections kept per host in the pool
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("broker_url", &self.broker_url)
            .field("auth_token", &"<redacted>")
            .field("database", &self.database)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("overall_timeout", &self.overall_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .finish()
    }
}

impl BrokerConfig {
    /// Configuration with default timeouts
    pub fn new(
        broker_url: impl Into<String>,
        auth_token: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        BrokerConfig {
            broker_url: broker_url.into(),
            auth_token: auth_token.into(),
            database: database.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE,
        }
    }

    /// Configuration for tests (short timeouts)
    pub fn test(broker_url: impl Into<String>) -> Self {
        BrokerConfig {
            request_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(200),
            overall_timeout: Duration::from_secs(2),
            ..BrokerConfig::new(broker_url, "test-token", "test-db")
        }
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let millis = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| ConfigError::Invalid {
                        name,
                        reason: e.to_string(),
                    }),
                None => Ok(default),
            }
        };

        let config = BrokerConfig {
            broker_url: required("DATABIN_BROKER_URL")?,
            auth_token: required("DATABIN_AUTH_TOKEN")?,
            database: required("DATABIN_DATABASE")?,
            request_timeout: millis("DATABIN_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT)?,
            connect_timeout: millis("DATABIN_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT)?,
            overall_timeout: millis("DATABIN_OVERALL_TIMEOUT_MS", DEFAULT_OVERALL_TIMEOUT)?,
            pool_max_idle_per_host: match lookup("DATABIN_POOL_MAX_IDLE") {
                Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        name: "DATABIN_POOL_MAX_IDLE",
                        reason: e.to_string(),
                    }
                })?,
                None => DEFAULT_POOL_MAX_IDLE,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: BrokerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker_url.trim().is_empty() {
            return Err(ConfigError::Missing("broker_url"));
        }
        if !(self.broker_url.starts_with("http://") || self.broker_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "broker_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.auth_token.trim().is_empty() {
            return Err(ConfigError::Missing("auth_token"));
        }
        if self.database.trim().is_empty() {
            return Err(ConfigError::Missing("database"));
        }
        if self.overall_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "overall_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_overall_timeout() -> Duration {
    DEFAULT_OVERALL_TIMEOUT
}

fn default_pool_max_idle() -> usize {
    DEFAULT_POOL_MAX_IDLE
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
