//! Service configuration from environment variables

use forecast_core::config::{list, parse_or};
use forecast_core::{ConfigError, Lookback, ProcessEnv, VarSource};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::PipelineConfig;
use crate::registry::RegistryConfig;
use crate::scheduler::SchedulerConfig;

const HOUR_SECS: u64 = 60 * 60;

/// Everything the binary needs besides the market-data client settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub registry_interval: Duration,
    pub cache_interval: Duration,
    pub tick_interval: Duration,
    pub symbol_delay: Duration,
    pub popular_limit: usize,
    pub horizon_days: usize,
    pub lookback_years: u32,
    /// Maximum age of a cached forecast served by the read path
    pub read_freshness: Duration,
    pub snapshot_max_age: Duration,
    /// Stored price histories younger than this skip the upstream fetch
    pub history_max_age: Duration,
    /// One weight per forecaster, in registration order
    pub ensemble_weights: Vec<Decimal>,
    pub db_path: PathBuf,
    pub meta_combiner_path: Option<PathBuf>,
    pub server_port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            registry_interval: Duration::from_secs(24 * HOUR_SECS),
            cache_interval: Duration::from_secs(12 * HOUR_SECS),
            tick_interval: Duration::from_secs(HOUR_SECS),
            symbol_delay: Duration::from_millis(2000),
            popular_limit: 30,
            horizon_days: 30,
            lookback_years: 5,
            read_freshness: Duration::from_secs(24 * HOUR_SECS),
            snapshot_max_age: Duration::from_secs(24 * HOUR_SECS),
            history_max_age: Duration::from_secs(24 * HOUR_SECS),
            ensemble_weights: vec![Decimal::new(6, 1), Decimal::new(4, 1)],
            db_path: PathBuf::from("data/forecasts.db"),
            meta_combiner_path: None,
            server_port: 5000,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(source: &impl VarSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let hours = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            let value: u64 = parse_or(source, key, default.as_secs() / HOUR_SECS)?;
            positive(key, value)?;
            value
                .checked_mul(HOUR_SECS)
                .map(Duration::from_secs)
                .ok_or_else(|| ConfigError::invalid(key, &value.to_string(), "too many hours"))
        };

        let tick_secs: u64 = parse_or(source, "TICK_INTERVAL_SECS", defaults.tick_interval.as_secs())?;
        positive("TICK_INTERVAL_SECS", tick_secs)?;
        let delay_ms: u64 = parse_or(
            source,
            "SYMBOL_DELAY_MS",
            defaults.symbol_delay.as_millis() as u64,
        )?;
        let popular_limit: usize = parse_or(source, "POPULAR_LIMIT", defaults.popular_limit)?;
        positive("POPULAR_LIMIT", popular_limit as u64)?;
        let horizon_days: usize = parse_or(source, "HORIZON_DAYS", defaults.horizon_days)?;
        positive("HORIZON_DAYS", horizon_days as u64)?;
        let lookback_years: u32 = parse_or(source, "LOOKBACK_YEARS", defaults.lookback_years)?;
        positive("LOOKBACK_YEARS", lookback_years as u64)?;

        let ensemble_weights = match list(source, "ENSEMBLE_WEIGHTS") {
            raw if raw.is_empty() => defaults.ensemble_weights,
            raw => raw
                .iter()
                .map(|w| {
                    w.parse::<Decimal>()
                        .map_err(|e| ConfigError::invalid("ENSEMBLE_WEIGHTS", w, e))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(Self {
            registry_interval: hours("REGISTRY_REFRESH_HOURS", defaults.registry_interval)?,
            cache_interval: hours("CACHE_REFRESH_HOURS", defaults.cache_interval)?,
            tick_interval: Duration::from_secs(tick_secs),
            symbol_delay: Duration::from_millis(delay_ms),
            popular_limit,
            horizon_days,
            lookback_years,
            read_freshness: hours("READ_FRESHNESS_HOURS", defaults.read_freshness)?,
            snapshot_max_age: hours("SNAPSHOT_MAX_AGE_HOURS", defaults.snapshot_max_age)?,
            history_max_age: hours("HISTORY_MAX_AGE_HOURS", defaults.history_max_age)?,
            ensemble_weights,
            db_path: source
                .var("FORECAST_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            meta_combiner_path: source.var("META_COMBINER_PATH").map(PathBuf::from),
            server_port: parse_or(source, "SERVER_PORT", defaults.server_port)?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            registry_interval: self.registry_interval,
            cache_interval: self.cache_interval,
            tick_interval: self.tick_interval,
            symbol_delay: self.symbol_delay,
            popular_limit: self.popular_limit,
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            popular_limit: self.popular_limit,
            snapshot_max_age: self.snapshot_max_age,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            lookback: Lookback::years(self.lookback_years),
            horizon: self.horizon_days,
        }
    }
}

fn positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_source(&source(&[])).unwrap();
        assert_eq!(config.cache_interval, Duration::from_secs(12 * 3600));
        assert_eq!(config.symbol_delay, Duration::from_secs(2));
        assert_eq!(config.ensemble_weights, vec![dec!(0.6), dec!(0.4)]);
        assert_eq!(config.server_port, 5000);
        assert!(config.meta_combiner_path.is_none());
        assert_eq!(config.pipeline_config().lookback.as_range(), "5y");
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_source(&source(&[
            ("CACHE_REFRESH_HOURS", "6"),
            ("HORIZON_DAYS", "10"),
            ("HISTORY_MAX_AGE_HOURS", "6"),
            ("ENSEMBLE_WEIGHTS", "1, 3"),
            ("META_COMBINER_PATH", "data/meta.json"),
        ]))
        .unwrap();
        assert_eq!(config.scheduler_config().cache_interval, Duration::from_secs(6 * 3600));
        assert_eq!(config.pipeline_config().horizon, 10);
        assert_eq!(config.history_max_age, Duration::from_secs(6 * 3600));
        assert_eq!(config.ensemble_weights, vec![dec!(1), dec!(3)]);
        assert_eq!(config.meta_combiner_path, Some(PathBuf::from("data/meta.json")));
    }

    #[test]
    fn test_invalid_values() {
        let err = ServiceConfig::from_source(&source(&[("HORIZON_DAYS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HORIZON_DAYS"));

        assert!(ServiceConfig::from_source(&source(&[("ENSEMBLE_WEIGHTS", "0.6,abc")])).is_err());
        assert!(ServiceConfig::from_source(&source(&[("SERVER_PORT", "http")])).is_err());
    }

    #[test]
    fn test_hours_overflow_is_rejected() {
        let err = ServiceConfig::from_source(&source(&[(
            "READ_FRESHNESS_HOURS",
            "18446744073709551615",
        )]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "READ_FRESHNESS_HOURS")
        );

        let max_hours = (u64::MAX / HOUR_SECS).to_string();
        let config =
            ServiceConfig::from_source(&source(&[("CACHE_REFRESH_HOURS", max_hours.as_str())])).unwrap();
        assert!(config.cache_interval > Duration::from_secs(u64::MAX - HOUR_SECS));
    }
}
