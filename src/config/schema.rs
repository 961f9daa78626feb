//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the API client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend location, credentials and per-attempt timeout.
    pub api: ApiConfig,

    /// Attempt budget and backoff policies.
    pub retries: RetryConfig,

    /// Minimum spacing between request starts.
    pub throttle: ThrottleConfig,

    /// Client-side rate accounting per (endpoint, user).
    pub rate_limit: RateLimitConfig,

    /// Auth token persistence and memory cache.
    pub token: TokenConfig,

    /// Resource cache freshness policies.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Build flavour. Controls whether the API key header is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Environment implied by the build profile.
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint is appended to (e.g., "https://api.example.com/api").
    pub base_url: String,

    /// Key sent as `X-API-Key` in production builds.
    pub api_key: Option<String>,

    /// Development or production.
    pub environment: Environment,

    /// Hard deadline for a single network attempt in milliseconds.
    pub request_timeout_ms: u64,

    /// User agent sent with every request.
    pub user_agent: String,

    /// Honour HTTP(S)_PROXY environment variables.
    pub use_system_proxy: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            api_key: None,
            environment: Environment::default(),
            request_timeout_ms: 30_000,
            user_agent: concat!("meal-client/", env!("CARGO_PKG_VERSION")).to_string(),
            use_system_proxy: true,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts per request (initial try included).
    pub max_attempts: u32,

    /// Base delay for 429 backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor for 429 backoff.
    pub backoff_multiplier: f64,

    /// Upper bound for 429 backoff in milliseconds (before jitter).
    pub max_backoff_delay_ms: u64,

    /// Maximum random jitter added to 429 backoff in milliseconds.
    pub max_jitter_ms: u64,

    /// Base delay for network/5xx backoff in milliseconds.
    pub network_base_delay_ms: u64,

    /// Upper bound for network/5xx backoff in milliseconds.
    pub network_max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_backoff_delay_ms: 30_000,
            max_jitter_ms: 1000,
            network_base_delay_ms: 1000,
            network_max_delay_ms: 5000,
        }
    }
}

/// Request spacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum time between two request starts in milliseconds.
    pub min_interval_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { min_interval_ms: 200 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable client-side rate accounting.
    pub enabled: bool,

    /// Sliding window length in milliseconds.
    pub window_ms: u64,

    /// Requests allowed per (endpoint, user) within one window.
    pub max_requests: u32,

    /// First cooldown after a server 429 in milliseconds. Doubles per consecutive 429.
    pub cooldown_base_ms: u64,

    /// Longest cooldown in milliseconds.
    pub cooldown_max_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 60,
            cooldown_base_ms: 2000,
            cooldown_max_ms: 60_000,
        }
    }
}

/// Token persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// File holding the persisted token. In-memory only when unset.
    pub storage_path: Option<String>,

    /// How long the in-memory copy is trusted without touching storage.
    pub cache_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            cache_ttl_secs: 300,
        }
    }
}

/// Freshness policy for one cache type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CachePolicy {
    /// Entries younger than this are served without revalidation.
    pub fresh_for_secs: u64,

    /// Entries older than this are discarded.
    pub max_age_secs: u64,
}

impl CachePolicy {
    pub const fn new(fresh_for_secs: u64, max_age_secs: u64) -> Self {
        Self {
            fresh_for_secs,
            max_age_secs,
        }
    }
}

/// Resource cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON file the cache is loaded from and saved to. Memory only when unset.
    pub persistence_path: Option<String>,

    /// Policy applied to cache types without an override.
    pub default_policy: CachePolicy,

    /// Per cache type overrides, keyed by cache type name (e.g., "meal_plans").
    pub policies: std::collections::HashMap<String, CachePolicy>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            default_policy: CachePolicy::new(300, 86_400),
            policies: std::collections::HashMap::new(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty for terminals, JSON for log shipping.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.retries.network_max_delay_ms, 5000);
        assert_eq!(config.throttle.min_interval_ms, 200);
        assert_eq!(config.token.cache_ttl_secs, 300);
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.com/api"
            environment = "production"

            [cache.policies.meal_plans]
            fresh_for_secs = 60
            max_age_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.api.environment, Environment::Production);
        assert_eq!(config.api.request_timeout_ms, 30_000);
        assert_eq!(
            config.cache.policies.get("meal_plans"),
            Some(&CachePolicy::new(60, 600))
        );
        assert_eq!(config.retries.max_attempts, 3);
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("Development".parse::<Environment>(), Ok(Environment::Development));
        assert!("staging".parse::<Environment>().is_err());
    }
}
