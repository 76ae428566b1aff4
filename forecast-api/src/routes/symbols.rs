//! Symbol registry endpoints

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use forecast_core::Symbol;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_PAGE: usize = 50;
const MAX_PAGE: usize = 500;

/// Query parameters for listing symbols
#[derive(Debug, Deserialize)]
pub struct ListSymbolsQuery {
    /// Case-insensitive substring filter
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SymbolsResponse {
    symbols: Vec<Symbol>,
    /// Matches before pagination
    total: usize,
    offset: usize,
    limit: usize,
}

#[derive(Debug, Serialize)]
struct SymbolCountResponse {
    total: usize,
    popular: usize,
}

/// Create symbol routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/symbols", get(list_symbols))
        .route("/symbols/popular", get(popular_symbols))
        .route("/symbols/count", get(symbol_count))
}

async fn list_symbols(
    State(state): State<AppState>,
    Query(params): Query<ListSymbolsQuery>,
) -> Json<SymbolsResponse> {
    let set = state.registry.current();
    let query = params.query.unwrap_or_default();
    let limit = params.limit.unwrap_or(DEFAULT_PAGE).min(MAX_PAGE);
    let offset = params.offset.unwrap_or(0);

    let matches: Vec<&Symbol> = set.search(&query).collect();
    let symbols = matches
        .iter()
        .skip(offset)
        .take(limit)
        .map(|s| (*s).clone())
        .collect();

    Json(SymbolsResponse {
        symbols,
        total: matches.len(),
        offset,
        limit,
    })
}

/// Symbols the scheduler keeps warm, in priority order
async fn popular_symbols(State(state): State<AppState>) -> Json<Vec<Symbol>> {
    let limit = state.scheduler.config().popular_limit;
    Json(state.registry.priority(limit))
}

async fn symbol_count(State(state): State<AppState>) -> Json<SymbolCountResponse> {
    let set = state.registry.current();
    Json(SymbolCountResponse {
        total: set.len(),
        popular: set.popular().len(),
    })
}
