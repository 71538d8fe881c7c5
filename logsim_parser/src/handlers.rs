//! HTTP surface for the parser service: health, ingest, query, delete.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ParserConfig;
use crate::database::Database;
use crate::error::ParserError;
use crate::filters;
use crate::ingest;
use crate::ml::handlers as ml_handlers;
use crate::ml::service::MlService;
use crate::response::success;
use crate::stats;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ParserConfig>,
    pub db: Database,
    pub ml: Arc<MlService>,
}

impl AppState {
    pub fn table(&self) -> &str {
        &self.config.logs.table_name
    }
}

pub fn create_router(state: AppState) -> Router {
    let alive_path = state.config.alive_path.clone();
    let main_path = state.config.main_path.clone();
    let count_path = state.config.count_path.clone();

    Router::new()
        .route(&alive_path, any(is_alive))
        .route(&main_path, any(handle_logs))
        .route(&count_path, any(logs_count))
        .route("/stats/status", any(stats::status_stats))
        .route("/stats/ip", any(stats::ip_stats))
        .route("/stats/time", any(stats::time_stats))
        .route("/stats/dashboard", any(stats::dashboard_stats))
        .route("/ml/insights", any(ml_handlers::insights))
        .route("/ml/anomalies", any(ml_handlers::anomalies))
        .route("/ml/predictions", any(ml_handlers::predictions))
        .route("/ml/security", any(ml_handlers::security))
        .route("/ml/clusters", any(ml_handlers::clusters))
        .route("/ml/realtime-anomaly", any(ml_handlers::realtime_anomaly))
        .route("/ml/config", any(ml_handlers::config_endpoint))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> Response {
    ParserError::NotFound.into_response()
}

async fn is_alive(State(state): State<AppState>) -> Response {
    debug!("health check hit");
    success(
        format!("Server {} is live", state.config.port),
        Value::Null,
    )
}

/// Method dispatcher for the main logs route.
async fn handle_logs(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    let result = if method == Method::GET {
        get_logs(&state, &params).await
    } else if method == Method::POST {
        add_logs(&state, &body).await
    } else if method == Method::DELETE {
        delete_logs(&state, &params).await
    } else {
        warn!("method {} not allowed on logs route", method);
        Err(ParserError::MethodNotAllowed(
            "Only GET, POST, DELETE methods are allowed to execute the task".to_string(),
        ))
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// Cursor-paginated list with counts and paging tokens.
async fn get_logs(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<Response, ParserError> {
    debug!("get logs hit");
    if !state.db.ping().await {
        return Err(ParserError::StoreUnavailable);
    }

    let filter = filters::filter_from_params(params)?;
    let page = filters::page_from_params(params)?;

    let total = state.db.count_all(state.table()).await?;
    let records = state.db.fetch_page(state.table(), &filter, &page).await?;
    let fetch = records.len();

    let next_cursor = if fetch as i64 == page.limit {
        records.last().map(|r| r.cursor().token())
    } else {
        None
    };
    let prev_cursor = if page.cursor.is_some() {
        records.first().map(|r| r.cursor().token())
    } else {
        None
    };

    let data = json!({
        "count": { "total": total, "fetch": fetch },
        "logs": records,
        "paging": {
            "next_cursor": next_cursor,
            "prev_cursor": prev_cursor,
            "limit": page.limit,
        },
    });
    let message = if fetch == 0 {
        "No logs found"
    } else {
        "Fetched logs successfully"
    };
    Ok(success(message, data))
}

/// Decodes a JSON string array, fans the lines out for parsing, and inserts
/// the surviving records in one batch.
async fn add_logs(state: &AppState, body: &Bytes) -> Result<Response, ParserError> {
    debug!("add logs hit");
    let lines: Vec<String> = serde_json::from_slice(body)
        .map_err(|_| ParserError::InvalidInput("Failed to decode log data".to_string()))?;

    if lines.is_empty() {
        return Ok(success(
            "Logs stored successfully, 0 rows inserted.",
            json!({ "rows_inserted": 0, "rows_dropped": 0 }),
        ));
    }
    if !state.db.ping().await {
        return Err(ParserError::StoreUnavailable);
    }

    let received = lines.len();
    let (records, dropped) = ingest::parse_lines(lines).await;
    let inserted = state.db.insert_batch(state.table(), &records).await?;
    info!(
        "ingest: received {}, inserted {}, dropped {}",
        received, inserted, dropped
    );

    Ok(success(
        format!("Logs stored successfully, {} rows inserted.", inserted),
        json!({ "rows_inserted": inserted, "rows_dropped": dropped }),
    ))
}

/// Filtered delete; refuses to run without at least one filter.
async fn delete_logs(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<Response, ParserError> {
    debug!("delete logs hit");
    if !state.db.ping().await {
        return Err(ParserError::StoreUnavailable);
    }

    let filter = filters::filter_from_params(params)?;
    let rows_affected = state.db.delete(state.table(), &filter).await?;

    let message = if rows_affected > 0 {
        format!("{} logs deleted successfully.", rows_affected)
    } else {
        "No logs found matching the provided filters.".to_string()
    };
    Ok(success(message, json!({ "rows_affected": rows_affected })))
}

/// Filtered count alongside the unfiltered total.
async fn logs_count(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let result = async {
        if method != Method::GET {
            return Err(ParserError::MethodNotAllowed(
                "Only GET method allowed".to_string(),
            ));
        }
        debug!("get logs count hit");
        if !state.db.ping().await {
            return Err(ParserError::StoreUnavailable);
        }

        let filter = filters::filter_from_params(&params)?;
        let total = state.db.count_all(state.table()).await?;
        let fetch = state.db.count_filtered(state.table(), &filter).await?;

        let message = if fetch <= 0 {
            "No logs found"
        } else {
            "Logs Found Success"
        };
        Ok(success(
            message,
            json!({ "total": total, "fetch": fetch }),
        ))
    }
    .await;
    result.unwrap_or_else(IntoResponse::into_response)
}
