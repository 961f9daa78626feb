//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and relationships.
//! Every problem is reported, not just the first one.

use std::fmt;

use url::Url;

use crate::config::schema::{CachePolicy, ClientConfig};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "api.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("api.base_url", e.to_string())),
    }

    if config.api.request_timeout_ms == 0 {
        errors.push(ValidationError::new("api.request_timeout_ms", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !retries.backoff_multiplier.is_finite() || retries.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new("retries.backoff_multiplier", "must be >= 1.0"));
    }
    if retries.max_backoff_delay_ms < retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_backoff_delay_ms",
            "must not be smaller than retries.base_delay_ms",
        ));
    }
    if retries.network_max_delay_ms < retries.network_base_delay_ms {
        errors.push(ValidationError::new(
            "retries.network_max_delay_ms",
            "must not be smaller than retries.network_base_delay_ms",
        ));
    }

    let rate = &config.rate_limit;
    if rate.enabled {
        if rate.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
        }
        if rate.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be greater than 0"));
        }
        if rate.cooldown_max_ms < rate.cooldown_base_ms {
            errors.push(ValidationError::new(
                "rate_limit.cooldown_max_ms",
                "must not be smaller than rate_limit.cooldown_base_ms",
            ));
        }
    }

    if config.token.cache_ttl_secs == 0 {
        errors.push(ValidationError::new("token.cache_ttl_secs", "must be greater than 0"));
    }

    check_policy("cache.default_policy", &config.cache.default_policy, &mut errors);
    for (name, policy) in &config.cache.policies {
        if crate::cache::CacheType::from_name(name).is_none() {
            errors.push(ValidationError::new(
                format!("cache.policies.{}", name),
                "unknown cache type",
            ));
        }
        check_policy(&format!("cache.policies.{}", name), policy, &mut errors);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_policy(field: &str, policy: &CachePolicy, errors: &mut Vec<ValidationError>) {
    if policy.max_age_secs == 0 {
        errors.push(ValidationError::new(
            format!("{}.max_age_secs", field),
            "must be greater than 0",
        ));
    }
    if policy.fresh_for_secs > policy.max_age_secs {
        errors.push(ValidationError::new(
            format!("{}.fresh_for_secs", field),
            "must not exceed max_age_secs",
        ));
    }
}
