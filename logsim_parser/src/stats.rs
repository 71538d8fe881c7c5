//! Aggregate statistics endpoints over the stored rows.

use axum::extract::State;
use axum::http::Method;
use axum::response::Response;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use crate::error::ParserError;
use crate::handlers::AppState;
use crate::response::success;

const TOP_IP_LIMIT: i64 = 10;
const TIME_WINDOW_HOURS: i64 = 24;

fn require_get(method: &Method) -> Result<(), ParserError> {
    if method == Method::GET {
        Ok(())
    } else {
        Err(ParserError::MethodNotAllowed(
            "Only GET method allowed".to_string(),
        ))
    }
}

async fn require_store(state: &AppState) -> Result<(), ParserError> {
    if state.db.ping().await {
        Ok(())
    } else {
        Err(ParserError::StoreUnavailable)
    }
}

/// Row counts per HTTP status code.
pub async fn status_stats(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    require_store(&state).await?;
    debug!("status stats hit");

    let counts = state.db.status_counts(state.table()).await?;
    let statuses: Vec<_> = counts
        .iter()
        .map(|(status, count)| json!({ "status": status, "count": count }))
        .collect();
    let total: i64 = counts.iter().map(|(_, count)| count).sum();

    Ok(success(
        "Status statistics fetched successfully",
        json!({ "statuses": statuses, "total": total }),
    ))
}

/// Top client addresses by request count.
pub async fn ip_stats(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    require_store(&state).await?;
    debug!("ip stats hit");

    let top = state.db.top_ips(state.table(), TOP_IP_LIMIT).await?;
    let ips: Vec<_> = top
        .iter()
        .map(|(ip, count)| json!({ "remote_addr": ip, "count": count }))
        .collect();

    Ok(success(
        "IP statistics fetched successfully",
        json!({ "top_ips": ips, "limit": TOP_IP_LIMIT }),
    ))
}

/// Per-hour request counts over the trailing day.
pub async fn time_stats(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    require_store(&state).await?;
    debug!("time stats hit");

    let hourly = state.db.hourly_counts(state.table(), TIME_WINDOW_HOURS).await?;
    let buckets: Vec<_> = hourly
        .iter()
        .map(|(hour, count)| json!({ "hour": hour, "count": count }))
        .collect();

    Ok(success(
        "Time statistics fetched successfully",
        json!({ "hours": buckets, "window_hours": TIME_WINDOW_HOURS }),
    ))
}

/// Combined dashboard aggregate: totals, error rate, sizes, breakdowns.
pub async fn dashboard_stats(
    State(state): State<AppState>,
    method: Method,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    require_store(&state).await?;
    debug!("dashboard stats hit");

    let table = state.table();
    let total = state.db.count_all(table).await?;
    let errors = state.db.error_count(table).await?;
    let unique_ips = state.db.unique_ip_count(table).await?;
    let avg_bytes = state.db.avg_body_bytes(table).await?;
    let statuses = state.db.status_counts(table).await?;
    let top_ips = state.db.top_ips(table, TOP_IP_LIMIT).await?;
    let hourly = state.db.hourly_counts(table, TIME_WINDOW_HOURS).await?;

    let error_rate = if total > 0 {
        errors as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let data = json!({
        "total_logs": total,
        "error_count": errors,
        "error_rate_pct": error_rate,
        "unique_ips": unique_ips,
        "avg_body_bytes": avg_bytes,
        "statuses": statuses
            .iter()
            .map(|(status, count)| json!({ "status": status, "count": count }))
            .collect::<Vec<_>>(),
        "top_ips": top_ips
            .iter()
            .map(|(ip, count)| json!({ "remote_addr": ip, "count": count }))
            .collect::<Vec<_>>(),
        "hourly": hourly
            .iter()
            .map(|(hour, count)| json!({ "hour": hour, "count": count }))
            .collect::<Vec<_>>(),
        "generated_at": Utc::now(),
    });

    Ok(success("Dashboard statistics fetched successfully", data))
}
