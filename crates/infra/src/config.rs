//! Ledger configuration.
//!
//! Values come from the environment (see the `ENV_*` constants) or from a
//! JSON document; anything missing falls back to [`LedgerConfig::default`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use stockroom_inventory::MAX_REASON_LEN;

pub const ENV_DATABASE_URL: &str = "STOCKROOM_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "STOCKROOM_MAX_CONNECTIONS";
pub const ENV_LOG_FILTER: &str = "RUST_LOG";
pub const ENV_MAX_REASON_LEN: &str = "STOCKROOM_MAX_REASON_LEN";
pub const ENV_LOW_STOCK_LIMIT: &str = "STOCKROOM_LOW_STOCK_LIMIT";
pub const ENV_TOP_VALUE_LIMIT: &str = "STOCKROOM_TOP_VALUE_LIMIT";
pub const ENV_ACTIVITY_DAYS: &str = "STOCKROOM_ACTIVITY_DAYS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Postgres connection string. Only the Postgres adapter needs it.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// `EnvFilter` directive for logging.
    pub log_filter: String,
    /// Longest accepted movement reason, in characters.
    pub max_reason_len: usize,
    /// Rows returned by the low-stock report.
    pub low_stock_report_limit: usize,
    /// Rows returned by the most-valuable-stock report.
    pub top_value_report_limit: usize,
    /// Days covered by the daily activity series.
    pub activity_window_days: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            log_filter: "info".to_string(),
            max_reason_len: MAX_REASON_LEN,
            low_stock_report_limit: 5,
            top_value_report_limit: 5,
            activity_window_days: 7,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests inject a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.trim().is_empty()) {
            config.database_url = Some(url);
        }
        if let Some(filter) = lookup(ENV_LOG_FILTER).filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }
        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_var(ENV_MAX_CONNECTIONS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_REASON_LEN) {
            config.max_reason_len = parse_var(ENV_MAX_REASON_LEN, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOW_STOCK_LIMIT) {
            config.low_stock_report_limit = parse_var(ENV_LOW_STOCK_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TOP_VALUE_LIMIT) {
            config.top_value_report_limit = parse_var(ENV_TOP_VALUE_LIMIT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ACTIVITY_DAYS) {
            config.activity_window_days = parse_var(ENV_ACTIVITY_DAYS, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid ledger configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.max_connections > 0, "max_connections must be at least 1");
        anyhow::ensure!(self.max_reason_len > 0, "max_reason_len must be at least 1");
        Ok(())
    }

    /// Connection string, or an error naming the variable to set.
    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .with_context(|| format!("{ENV_DATABASE_URL} is not set"))
    }

    /// Install the JSON tracing subscriber filtered by `log_filter`.
    /// A no-op once a global subscriber exists.
    pub fn init_tracing(&self) {
        stockroom_observability::init_with_filter(&self.log_filter);
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(config.max_reason_len, 1000);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (ENV_DATABASE_URL, "postgres://localhost/stock"),
            (ENV_MAX_CONNECTIONS, "12"),
            (ENV_LOG_FILTER, "stockroom_infra=debug"),
            (ENV_LOW_STOCK_LIMIT, " 10 "),
            (ENV_TOP_VALUE_LIMIT, "3"),
            (ENV_ACTIVITY_DAYS, "30"),
        ]))
        .unwrap();

        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/stock");
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.log_filter, "stockroom_infra=debug");
        assert_eq!(config.low_stock_report_limit, 10);
        assert_eq!(config.top_value_report_limit, 3);
        assert_eq!(config.activity_window_days, 30);
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = LedgerConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "many")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_CONNECTIONS));

        assert!(LedgerConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "0")])).is_err());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = LedgerConfig::from_json(r#"{ "max_reason_len": 200 }"#).unwrap();
        assert_eq!(config.max_reason_len, 200);
        assert_eq!(config.low_stock_report_limit, 5);

        assert!(LedgerConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn tracing_uses_the_configured_filter() {
        let config = LedgerConfig::from_lookup(lookup(&[(ENV_LOG_FILTER, "stockroom_infra=debug")])).unwrap();
        config.init_tracing();
        config.init_tracing();
        assert!(tracing::enabled!(target: "stockroom_infra", tracing::Level::DEBUG));
    }
}
