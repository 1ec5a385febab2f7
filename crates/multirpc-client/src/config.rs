use multirpc_common::protocol::error::{MultirpcError, Result};
use multirpc_common::transport::http::{DEFAULT_MAX_RESPONSE_BYTES, DEFAULT_TIMEOUT_MS};
use multirpc_common::transport::HttpTransportConfig;
use std::time::Duration;

use crate::outcome::AggregationPolicy;

/// Environment variable overriding [`ClientConfig::request_timeout_ms`]
pub const ENV_REQUEST_TIMEOUT_MS: &str = "MULTIRPC_REQUEST_TIMEOUT_MS";
/// Environment variable overriding [`ClientConfig::max_response_bytes`]
pub const ENV_MAX_RESPONSE_BYTES: &str = "MULTIRPC_MAX_RESPONSE_BYTES";
/// Environment variable overriding [`ClientConfig::aggregation`] (`all` or `triggering`)
pub const ENV_AGGREGATION: &str = "MULTIRPC_AGGREGATION";

/// Client configuration.
///
/// # Default Configuration
///
/// - `app_name` / `app_version`: `multirpc` and this crate's version
/// - `request_timeout_ms`: 30000 (30 seconds)
/// - `max_response_bytes`: 16 MB
/// - `aggregation`: [`AggregationPolicy::AllOutcomes`]
///
/// # Example
///
/// ```
/// use multirpc_client::{AggregationPolicy, ClientConfig};
///
/// let config = ClientConfig::default()
///     .with_app("sample-client", "1.0")
///     .with_request_timeout_ms(5_000)
///     .with_aggregation(AggregationPolicy::TriggeringOutcome);
///
/// assert_eq!(config.to_transport_config().user_agent, "sample-client/1.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Application name, sent in the `User-Agent` header
    pub app_name: String,
    /// Application version, sent in the `User-Agent` header
    pub app_version: String,
    /// Per-call timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Largest response body accepted from a server
    pub max_response_bytes: usize,
    /// How fan-out outcomes are combined
    pub aggregation: AggregationPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: "multirpc".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            aggregation: AggregationPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_app(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.app_name = name.into();
        self.app_version = version.into();
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    pub fn with_aggregation(mut self, policy: AggregationPolicy) -> Self {
        self.aggregation = policy;
        self
    }

    /// Defaults overlaid with any `MULTIRPC_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`MultirpcError::InvalidArgument`] if a variable is set but
    /// does not parse.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value if set.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_number(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_RESPONSE_BYTES) {
            self.max_response_bytes = parse_number(ENV_MAX_RESPONSE_BYTES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_AGGREGATION) {
            self.aggregation = raw.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(MultirpcError::InvalidArgument(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_response_bytes == 0 {
            return Err(MultirpcError::InvalidArgument(
                "max response size must be greater than zero".to_string(),
            ));
        }
        if self.app_name.trim().is_empty() {
            return Err(MultirpcError::InvalidArgument(
                "application name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The transport settings this configuration implies.
    pub fn to_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_millis(self.request_timeout_ms),
            max_response_bytes: self.max_response_bytes,
            user_agent: format!("{}/{}", self.app_name, self.app_version),
        }
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N> {
    raw.trim().parse().map_err(|_| {
        MultirpcError::InvalidArgument(format!("{} must be a non-negative integer, got '{}'", key, raw))
    })
}
