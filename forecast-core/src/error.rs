//! Error types for the forecast service

use thiserror::Error;

/// Workspace-wide error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Fetch error for {symbol}: {message}")]
    Fetch { symbol: String, message: String },

    #[error("Symbol provider error: {0}")]
    Provider(String),

    #[error("Model error ({model}): {message}")]
    Model { model: String, message: String },

    #[error("Misaligned forecast from {model}: expected {expected} points, got {actual}")]
    MisalignedForecast {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid ensemble weights: {0}")]
    InvalidWeights(String),

    #[error("No forecaster produced output ({failures} failed)")]
    NoForecasterOutput { failures: usize },

    #[error("Preprocessing error: {0}")]
    Preprocess(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ForecastError {
    pub fn fetch(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        ForecastError::Fetch {
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        ForecastError::Provider(msg.into())
    }

    pub fn model(model: impl Into<String>, message: impl Into<String>) -> Self {
        ForecastError::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    pub fn invalid_weights(msg: impl Into<String>) -> Self {
        ForecastError::InvalidWeights(msg.into())
    }

    pub fn preprocess(msg: impl Into<String>) -> Self {
        ForecastError::Preprocess(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        ForecastError::Storage(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ForecastError::Config(msg.into())
    }

    /// Whether the failure originated at the upstream market-data provider
    pub fn is_upstream(&self) -> bool {
        matches!(self, ForecastError::Fetch { .. } | ForecastError::Provider(_))
    }
}

/// Result type alias for forecast operations
pub type ForecastResult<T> = Result<T, ForecastError>;
