//! Engine configuration.
//!
//! Values come from the environment; anything missing or unparsable falls back
//! to the default with a warning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use storefront_catalog::PlaceholderPattern;
use storefront_catalog::diff::DEFAULT_PLACEHOLDER_PREFIX;

pub const ENV_PHASE_ONE_TIMEOUT_MS: &str = "STOREFRONT_PHASE_ONE_TIMEOUT_MS";
pub const ENV_ITEM_TIMEOUT_MS: &str = "STOREFRONT_ITEM_TIMEOUT_MS";
pub const ENV_PLACEHOLDER_PREFIX: &str = "STOREFRONT_PLACEHOLDER_PREFIX";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "STOREFRONT_DB_MAX_CONNECTIONS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Budget of the atomic product transaction.
    #[serde(with = "millis")]
    pub phase_one_budget: Duration,
    /// Budget of each best-effort variant transaction.
    #[serde(with = "millis")]
    pub item_budget: Duration,
    pub placeholder_prefix: String,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            phase_one_budget: Duration::from_secs(5),
            item_budget: Duration::from_secs(3),
            placeholder_prefix: DEFAULT_PLACEHOLDER_PREFIX.to_string(),
            database_url: None,
            max_connections: 10,
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            phase_one_budget: parse_or(&lookup, ENV_PHASE_ONE_TIMEOUT_MS, defaults.phase_one_budget.as_millis() as u64)
                .map(Duration::from_millis)
                .unwrap_or(defaults.phase_one_budget),
            item_budget: parse_or(&lookup, ENV_ITEM_TIMEOUT_MS, defaults.item_budget.as_millis() as u64)
                .map(Duration::from_millis)
                .unwrap_or(defaults.item_budget),
            placeholder_prefix: lookup(ENV_PLACEHOLDER_PREFIX)
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.placeholder_prefix),
            database_url: lookup(ENV_DATABASE_URL).filter(|u| !u.is_empty()),
            max_connections: parse_or(&lookup, ENV_DB_MAX_CONNECTIONS, defaults.max_connections)
                .unwrap_or(defaults.max_connections),
        }
    }

    pub fn placeholder(&self) -> PlaceholderPattern {
        PlaceholderPattern::new(self.placeholder_prefix.clone())
    }

    pub fn with_budgets(mut self, phase_one: Duration, item: Duration) -> Self {
        self.phase_one_budget = phase_one;
        self.item_budget = item;
        self
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Option<T>
where
    T: core::str::FromStr + core::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, %default, "unparsable setting; using default");
            None
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
