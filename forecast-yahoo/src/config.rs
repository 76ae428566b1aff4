//! Yahoo client configuration

use forecast_core::{config, ConfigError, ProcessEnv, VarSource};
use rust_decimal::Decimal;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_USD_TO_INR: Decimal = Decimal::from_parts(825, 0, 0, false, 1);
/// 250ms between requests keeps bursts under the chart API's throttling
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    /// Currency every price is reported in
    pub display_currency: String,
    /// Fixed USD→INR rate applied when the display currency is INR
    pub usd_to_inr: Decimal,
    pub min_interval: Duration,
    pub request_timeout: Duration,
    /// Extra newline-separated symbol lists merged into the universe
    pub symbol_list_urls: Vec<String>,
    /// Include the compiled-in NIFTY and S&P lists
    pub include_builtin_lists: bool,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            display_currency: "INR".to_string(),
            usd_to_inr: DEFAULT_USD_TO_INR,
            min_interval: Duration::from_millis(DEFAULT_MIN_INTERVAL_MS),
            request_timeout: Duration::from_secs(30),
            symbol_list_urls: Vec::new(),
            include_builtin_lists: true,
        }
    }
}

impl YahooConfig {
    /// Load from the process environment
    ///
    /// Reads `YAHOO_BASE_URL`, `DISPLAY_CURRENCY`, `USD_TO_INR`,
    /// `YAHOO_MIN_INTERVAL_MS`, `SYMBOL_LIST_URLS` and `YAHOO_BUILTIN_LISTS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source(source: &impl VarSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = source.var("YAHOO_BASE_URL").unwrap_or(defaults.base_url);
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::invalid("YAHOO_BASE_URL", &base_url, e))?;

        let display_currency = source
            .var("DISPLAY_CURRENCY")
            .map(|c| c.trim().to_uppercase())
            .unwrap_or(defaults.display_currency);

        let usd_to_inr: Decimal = config::parse_or(source, "USD_TO_INR", defaults.usd_to_inr)?;
        if usd_to_inr <= Decimal::ZERO {
            return Err(ConfigError::invalid(
                "USD_TO_INR",
                &usd_to_inr.to_string(),
                "must be positive",
            ));
        }

        let min_interval_ms =
            config::parse_or(source, "YAHOO_MIN_INTERVAL_MS", DEFAULT_MIN_INTERVAL_MS)?;

        Ok(Self {
            base_url,
            display_currency,
            usd_to_inr,
            min_interval: Duration::from_millis(min_interval_ms),
            request_timeout: defaults.request_timeout,
            symbol_list_urls: config::list(source, "SYMBOL_LIST_URLS"),
            include_builtin_lists: config::parse_or(source, "YAHOO_BUILTIN_LISTS", true)?,
        })
    }
}
