//! Stock Forecast Cache API Server
//!
//! Keeps ensemble forecasts for the popular symbols warm in the background
//! and serves them, computing on demand for anything else.
//!
//! `forecast-api fit-meta <SYMBOL>` fits the linear meta-combiner on one
//! symbol's history and writes it to `META_COMBINER_PATH` instead of
//! starting the server.

mod routes;

use anyhow::{anyhow, bail};
use axum::{
    http::{header, Method},
    Router,
};
use forecast_core::{MarketDataProvider, Symbol};
use forecast_models::{
    AttentionForecaster, EnsembleCombiner, Forecaster, LinearMetaCombiner, SeasonalForecaster,
};
use forecast_services::{
    CacheReader, Clock, ForecastPipeline, ForecastStore, HistoryCache, PredictionCache,
    RefreshScheduler, RefreshWatermarks, ServiceConfig, SymbolRegistry, SystemClock,
};
use forecast_yahoo::{YahooClient, YahooConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<CacheReader>,
    pub registry: Arc<SymbolRegistry>,
    pub scheduler: Arc<RefreshScheduler>,
    /// Default freshness for forecast reads
    pub read_freshness: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,forecast_api=debug")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let yahoo_config = YahooConfig::from_env()?;
    info!(
        "Display currency {}, Yahoo requests spaced {:?}",
        yahoo_config.display_currency, yahoo_config.min_interval
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Forecast store (SQLite), also holding fetched price histories
    info!("Initializing forecast store at: {:?}", config.db_path);
    let store = Arc::new(ForecastStore::new(&config.db_path)?);

    let provider: Arc<dyn MarketDataProvider> = Arc::new(HistoryCache::new(
        Arc::new(YahooClient::new(yahoo_config)),
        store.clone(),
        clock.clone(),
        config.history_max_age,
    ));
    let combiner = Arc::new(build_combiner(&config)?);
    info!(
        "Ensemble models {:?}, weights {:?}, meta-combiner: {}",
        combiner.model_ids(),
        combiner.weights(),
        combiner.has_meta_combiner()
    );
    let pipeline = Arc::new(ForecastPipeline::new(
        provider.clone(),
        combiner,
        clock.clone(),
        config.pipeline_config(),
    ));

    let mut args = std::env::args().skip(1);
    if let Some(command) = args.next() {
        return match command.as_str() {
            "fit-meta" => {
                let symbol = args
                    .next()
                    .ok_or_else(|| anyhow!("usage: forecast-api fit-meta <SYMBOL>"))?;
                fit_meta(&pipeline, &config, Symbol::new(symbol)).await
            }
            other => bail!("unknown command: {}", other),
        };
    }

    info!("Starting Stock Forecast Cache API");

    let cache = Arc::new(PredictionCache::with_store(clock.clone(), store.clone()));

    let registry = Arc::new(
        SymbolRegistry::load(
            provider.clone(),
            Some(store),
            clock.clone(),
            config.registry_config(),
        )
        .await,
    );
    info!("Symbol registry holds {} symbols", registry.current().len());

    let reader = Arc::new(CacheReader::new(cache.clone(), pipeline.clone()));

    // A registry loaded at startup counts as this cycle's refresh
    let scheduler = Arc::new(
        RefreshScheduler::new(
            registry.clone(),
            cache,
            pipeline,
            clock,
            config.scheduler_config(),
        )
        .with_watermarks(RefreshWatermarks {
            last_registry_refresh: registry.refreshed_at(),
            last_cache_refresh: None,
        }),
    );

    let cancel = CancellationToken::new();
    let scheduler_handle = scheduler.clone().spawn(cancel.clone());

    let state = AppState {
        reader,
        registry,
        scheduler,
        read_freshness: config.read_freshness,
    };

    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // In-flight refresh work is abandoned
    cancel.cancel();
    scheduler_handle.abort();
    info!("Server stopped");

    Ok(())
}

fn build_combiner(config: &ServiceConfig) -> anyhow::Result<EnsembleCombiner> {
    let forecasters = vec![
        Arc::new(AttentionForecaster::default()) as Arc<dyn Forecaster>,
        Arc::new(SeasonalForecaster::default()) as Arc<dyn Forecaster>,
    ];
    let combiner = EnsembleCombiner::new(forecasters, Some(config.ensemble_weights.clone()))?;

    match &config.meta_combiner_path {
        Some(path) if path.exists() => {
            let meta = LinearMetaCombiner::load(path)?;
            info!("Loaded meta-combiner from {:?}", path);
            Ok(combiner.with_meta_combiner(Arc::new(meta))?)
        }
        Some(path) => {
            warn!("Meta-combiner file {:?} not found, using weighted average", path);
            Ok(combiner)
        }
        None => Ok(combiner),
    }
}

async fn fit_meta(
    pipeline: &ForecastPipeline,
    config: &ServiceConfig,
    symbol: Symbol,
) -> anyhow::Result<()> {
    let path = config
        .meta_combiner_path
        .as_ref()
        .ok_or_else(|| anyhow!("META_COMBINER_PATH must be set to fit a meta-combiner"))?;

    info!("Fitting meta-combiner on {}", symbol);
    let fitted = pipeline.fit_meta(&symbol).await?;
    fitted.save(path)?;
    info!(
        intercept = fitted.intercept,
        coefficients = ?fitted.coefficients,
        "Meta-combiner written to {:?}",
        path
    );
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    cancel.cancel();
}
