//! Resource cache keyed by (resource type, user id).
//!
//! # Data Flow
//! ```text
//! http/cached.rs
//!     → CacheStore::get (fresh | stale | miss, expired entries evicted)
//!     → CacheStore::set after a successful fetch
//!
//! startup / shutdown
//!     → MemoryCacheStore::load_from_file / save_to_file
//! ```
//!
//! Freshness is decided by the store from each type's [`CachePolicy`]; the
//! orchestrator only reacts to the `is_stale` flag.

pub mod store;

use std::fmt;

pub use store::{CacheKey, CacheSource, CacheStats, CacheStore, CachedValue, MemoryCacheStore};

use crate::config::CachePolicy;

/// Kinds of cached resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheType {
    MealPlans,
    MealPlan,
    Subscriptions,
    Orders,
    DriverOrders,
    Notifications,
    Profile,
    Discounts,
}

impl CacheType {
    pub const ALL: [CacheType; 8] = [
        CacheType::MealPlans,
        CacheType::MealPlan,
        CacheType::Subscriptions,
        CacheType::Orders,
        CacheType::DriverOrders,
        CacheType::Notifications,
        CacheType::Profile,
        CacheType::Discounts,
    ];

    /// Stable name used in config files and persisted keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::MealPlans => "meal_plans",
            CacheType::MealPlan => "meal_plan",
            CacheType::Subscriptions => "subscriptions",
            CacheType::Orders => "orders",
            CacheType::DriverOrders => "driver_orders",
            CacheType::Notifications => "notifications",
            CacheType::Profile => "profile",
            CacheType::Discounts => "discounts",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness policies per cache type, with a fallback.
#[derive(Debug, Clone)]
pub struct CachePolicies {
    default: CachePolicy,
    overrides: std::collections::HashMap<CacheType, CachePolicy>,
}

impl CachePolicies {
    pub fn new(default: CachePolicy) -> Self {
        Self {
            default,
            overrides: std::collections::HashMap::new(),
        }
    }

    /// Build from config. Unknown names are skipped (validation rejects them earlier).
    pub fn from_config(config: &crate::config::CacheConfig) -> Self {
        let mut policies = Self::new(config.default_policy);
        for (name, policy) in &config.policies {
            if let Some(cache_type) = CacheType::from_name(name) {
                policies.overrides.insert(cache_type, *policy);
            }
        }
        policies
    }

    pub fn with(mut self, cache_type: CacheType, policy: CachePolicy) -> Self {
        self.overrides.insert(cache_type, policy);
        self
    }

    pub fn policy_for(&self, cache_type: CacheType) -> CachePolicy {
        self.overrides
            .get(&cache_type)
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for CachePolicies {
    fn default() -> Self {
        Self::from_config(&crate::config::CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for cache_type in CacheType::ALL {
            assert_eq!(CacheType::from_name(cache_type.as_str()), Some(cache_type));
        }
        assert_eq!(CacheType::from_name("groceries"), None);
    }

    #[test]
    fn test_policy_override() {
        let mut config = crate::config::CacheConfig::default();
        config
            .policies
            .insert("orders".to_string(), CachePolicy::new(10, 20));

        let policies = CachePolicies::from_config(&config);
        assert_eq!(policies.policy_for(CacheType::Orders), CachePolicy::new(10, 20));
        assert_eq!(policies.policy_for(CacheType::MealPlans), config.default_policy);
    }
}
