use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AnimeSearchError;
use crate::query::{clamp_limit, clamp_offset, parse_exclude_list, validate_query};
use crate::search::{RankedAnime, SearchService};

/// Shared application state, constructed once at startup. `service` is
/// `None` when resource loading failed; the process then serves but
/// reports unhealthy until restarted.
pub struct AppState {
    pub config: Config,
    pub service: Option<SearchService>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(search))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    data_loaded: bool,
    total_anime: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let loaded = state.service.is_some();
    let body = HealthResponse {
        status: if loaded { "healthy" } else { "unhealthy" },
        model_loaded: loaded,
        data_loaded: loaded,
        total_anime: state.service.as_ref().map_or(0, |s| s.catalog_len()),
    };
    let code = if loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// Raw query parameters. `limit`/`offset` stay strings so a non-integer
/// value produces the documented 400 body instead of an extractor
/// rejection.
#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    exclude: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<RankedAnime>,
    total: usize,
    limit: usize,
    offset: usize,
    has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

fn error_response(code: StatusCode, error: &str, message: Option<&str>) -> Response {
    let body = ErrorBody {
        error: error.to_string(),
        message: message.map(str::to_string),
    };
    (code, Json(body)).into_response()
}

fn internal_error(err: AnimeSearchError) -> Response {
    // Full detail stays server-side; the client gets an opaque body.
    error!(error = %err, "error during search");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
        Some("An error occurred while processing your search. Please try again."),
    )
}

fn parse_pagination(
    params: &SearchParams,
    config: &Config,
) -> std::result::Result<(usize, usize), &'static str> {
    let limit = match &params.limit {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| "Invalid limit or offset parameter")?,
        None => config.default_limit as i64,
    };
    let offset = match &params.offset {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| "Invalid limit or offset parameter")?,
        None => 0,
    };
    Ok((clamp_limit(limit, config.max_limit), clamp_offset(offset)))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Response {
    let Some(service) = &state.service else {
        error!("search attempted but system not initialized");
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "System not initialized",
            Some("The AI model or data is not loaded. Please check server logs."),
        );
    };

    let query = match validate_query(params.q.as_deref(), state.config.max_query_length) {
        Ok(query) => query,
        Err(AnimeSearchError::InvalidQuery(msg)) => {
            warn!(error = %msg, "invalid query");
            return error_response(StatusCode::BAD_REQUEST, &msg, None);
        }
        Err(other) => return internal_error(other),
    };

    let exclude = parse_exclude_list(params.exclude.as_deref().unwrap_or(""));

    let (limit, offset) = match parse_pagination(&params, &state.config) {
        Ok(pagination) => pagination,
        Err(msg) => {
            warn!(error = msg, "invalid pagination parameters");
            return error_response(StatusCode::BAD_REQUEST, msg, None);
        }
    };

    info!(query = %query, limit, offset, excluded = exclude.len(), "search query");

    match service.search(&query, &exclude, limit, offset) {
        Ok(page) => {
            let message = (page.results.is_empty() && offset == 0).then(|| {
                warn!(query = %query, "no results found");
                "No anime found matching your query. Try different keywords.".to_string()
            });
            let body = SearchResponse {
                has_more: offset + limit < page.total,
                total: page.total,
                limit,
                offset,
                results: page.results,
                message,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => internal_error(err),
    }
}
