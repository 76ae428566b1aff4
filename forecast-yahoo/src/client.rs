//! Yahoo Finance chart API client

use async_trait::async_trait;
use forecast_core::{
    ForecastError, ForecastResult, Lookback, MarketDataProvider, PriceSeries, StockMetadata,
    Symbol,
};
use indexmap::IndexSet;
use reqwest::Client;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    types::{ChartResponse, ChartResult},
    universe, RateLimiter, YahooConfig,
};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; forecast-cache/0.1)";

/// Yahoo Finance market-data client
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    config: YahooConfig,
    limiter: Arc<RateLimiter>,
}

impl YahooClient {
    pub fn new(config: YahooConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");
        let limiter = Arc::new(RateLimiter::new(config.min_interval, "Yahoo"));

        Self {
            client,
            config,
            limiter,
        }
    }

    pub fn config(&self) -> &YahooConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Multiplier and reported currency for a quote in `quoted` currency.
    ///
    /// USD quotes are converted at the fixed rate when the display currency
    /// is INR; everything else passes through. A missing quote currency is
    /// inferred from the listing suffix.
    pub fn conversion(&self, symbol: &Symbol, quoted: Option<&str>) -> (Decimal, String) {
        let quoted = quoted.map(str::to_uppercase).unwrap_or_else(|| {
            if symbol.is_indian_listing() {
                "INR".to_string()
            } else {
                "USD".to_string()
            }
        });
        if self.config.display_currency == "INR" && quoted == "USD" {
            (self.config.usd_to_inr, "INR".to_string())
        } else {
            (Decimal::ONE, quoted)
        }
    }

    fn chart_url(&self, symbol: &Symbol, range: &str) -> ForecastResult<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ForecastError::config(format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ForecastError::config("base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol.as_str()]);
        url.query_pairs_mut()
            .append_pair("range", range)
            .append_pair("interval", "1d")
            .append_pair("includePrePost", "false");
        Ok(url)
    }

    #[instrument(skip(self, symbol), fields(symbol = %symbol))]
    async fn fetch_chart(&self, symbol: &Symbol, range: &str) -> ForecastResult<ChartResult> {
        let url = self.chart_url(symbol, range)?;
        self.limiter.acquire().await;
        debug!("Fetching Yahoo chart from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ForecastError::fetch(symbol.as_str(), format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::fetch(symbol.as_str(), format!("reading body: {}", e)))?;
        let parsed: Result<ChartResponse, _> = serde_json::from_str(&body);

        if !status.is_success() {
            let detail = parsed
                .ok()
                .and_then(|r| r.chart.error)
                .map(|e| e.to_string())
                .unwrap_or(body);
            return Err(ForecastError::fetch(
                symbol.as_str(),
                format!("Yahoo API error ({}): {}", status, detail),
            ));
        }

        let parsed = parsed.map_err(|e| {
            ForecastError::fetch(symbol.as_str(), format!("failed to parse chart: {}", e))
        })?;
        if let Some(error) = parsed.chart.error {
            return Err(ForecastError::fetch(symbol.as_str(), error.to_string()));
        }
        parsed
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ForecastError::fetch(symbol.as_str(), "empty chart result"))
    }

    #[instrument(skip(self))]
    async fn fetch_symbol_list(&self, url: &str) -> ForecastResult<Vec<Symbol>> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ForecastError::provider(format!("fetching {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(ForecastError::provider(format!(
                "symbol list {} returned {}",
                url,
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ForecastError::provider(format!("reading {}: {}", url, e)))?;
        Ok(universe::parse_symbol_list(&body))
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        lookback: Lookback,
    ) -> ForecastResult<PriceSeries> {
        let chart = self.fetch_chart(symbol, &lookback.as_range()).await?;
        let (factor, currency) = self.conversion(symbol, chart.meta.currency.as_deref());
        let bars = chart.to_bars(factor);
        if bars.is_empty() {
            return Err(ForecastError::fetch(symbol.as_str(), "no price data returned"));
        }
        debug!(symbol = %symbol, bars = bars.len(), currency = %currency, "History fetched");
        Ok(PriceSeries::new(symbol.clone(), currency, bars))
    }

    async fn fetch_metadata(&self, symbol: &Symbol) -> ForecastResult<StockMetadata> {
        let chart = self.fetch_chart(symbol, "1d").await?;
        let (factor, currency) = self.conversion(symbol, chart.meta.currency.as_deref());
        Ok(chart.to_metadata(factor, &currency))
    }

    fn list_popular(&self, limit: usize) -> Vec<Symbol> {
        universe::popular(limit)
    }

    async fn refresh_symbol_universe(&self) -> ForecastResult<IndexSet<Symbol>> {
        let mut symbols = if self.config.include_builtin_lists {
            universe::builtin_universe()
        } else {
            IndexSet::new()
        };

        for url in &self.config.symbol_list_urls {
            match self.fetch_symbol_list(url).await {
                Ok(list) => {
                    info!("Loaded {} symbols from {}", list.len(), url);
                    symbols.extend(list);
                }
                Err(e) => warn!("Skipping symbol list {}: {}", url, e),
            }
        }

        if symbols.is_empty() {
            return Err(ForecastError::provider("no symbol source produced any symbols"));
        }
        Ok(symbols)
    }
}
