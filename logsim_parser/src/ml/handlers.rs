//! HTTP endpoints for the analytics engine.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::Method;
use axum::response::Response;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::error::ParserError;
use crate::handlers::AppState;
use crate::response::success;

use super::service::{SeriesKey, DEFAULT_WINDOW_HOURS, MAX_WINDOW_HOURS};
use super::MlConfig;

fn require_get(method: &Method) -> Result<(), ParserError> {
    if method == Method::GET {
        Ok(())
    } else {
        Err(ParserError::MethodNotAllowed(
            "Only GET method allowed".to_string(),
        ))
    }
}

fn window_hours(params: &HashMap<String, String>, key: &str) -> i64 {
    params
        .get(key)
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|h| (1..=MAX_WINDOW_HOURS).contains(h))
        .unwrap_or(DEFAULT_WINDOW_HOURS)
}

pub async fn insights(State(state): State<AppState>, method: Method) -> Result<Response, ParserError> {
    require_get(&method)?;
    info!("insights endpoint hit");
    let insights = state.ml.generate_insights(DEFAULT_WINDOW_HOURS).await?;
    Ok(success("ML insights generated successfully", json!(insights)))
}

pub async fn anomalies(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    let hours = window_hours(&params, "hours");
    let seasonal = params.get("seasonal").map(String::as_str) == Some("true");
    let series = match params.get("series").filter(|s| !s.is_empty()) {
        Some(name) => SeriesKey::parse(name).ok_or_else(|| {
            ParserError::InvalidInput(format!("Invalid 'series' parameter: '{}'", name))
        })?,
        None => SeriesKey::default(),
    };

    let anomalies = state.ml.anomalies(hours, series, seasonal).await?;

    let total_count = anomalies.len();
    let data = json!({
        "anomalies": anomalies,
        "total_count": total_count,
        "time_range": format!("{} hours", hours),
        "generated_at": Utc::now(),
    });
    Ok(success("Anomaly detection completed", data))
}

pub async fn predictions(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    let hours_ahead = window_hours(&params, "hours_ahead");

    let (predictions, trend_analysis) = state.ml.predictions(hours_ahead as usize).await?;

    let total_count = predictions.len();
    let data = json!({
        "predictions": predictions,
        "total_count": total_count,
        "hours_ahead": hours_ahead,
        "trend_analysis": trend_analysis,
        "generated_at": Utc::now(),
    });
    Ok(success("Predictions generated successfully", data))
}

pub async fn security(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ParserError> {
    require_get(&method)?;
    let hours = window_hours(&params, "hours");
    let severity = params.get("severity").filter(|s| !s.is_empty());

    let insights = state.ml.generate_insights(hours).await?;
    let threats: Vec<_> = insights
        .security_threats
        .into_iter()
        .filter(|t| severity.map(|s| t.severity == s.as_str()).unwrap_or(true))
        .collect();

    let mut threat_stats: HashMap<String, HashMap<&str, usize>> = HashMap::new();
    for threat in &threats {
        *threat_stats
            .entry(threat.threat_type.clone())
            .or_default()
            .entry(threat.severity)
            .or_insert(0) += 1;
    }

    let total_count = threats.len();
    let data = json!({
        "threats": threats,
        "total_count": total_count,
        "threat_stats": threat_stats,
        "time_range": format!("{} hours", hours),
        "generated_at": Utc::now(),
    });
    Ok(success("Security threat analysis completed", data))
}

pub async fn clusters(State(state): State<AppState>, method: Method) -> Result<Response, ParserError> {
    require_get(&method)?;
    let insights = state.ml.generate_insights(DEFAULT_WINDOW_HOURS).await?;

    let mut cluster_stats: HashMap<usize, serde_json::Value> = HashMap::new();
    let mut grouped: HashMap<usize, Vec<&super::ClusterResult>> = HashMap::new();
    for cluster in &insights.clusters {
        grouped.entry(cluster.cluster_id).or_default().push(cluster);
    }
    for (cluster_id, members) in &grouped {
        let count = members.len() as f64;
        cluster_stats.insert(
            *cluster_id,
            json!({
                "user_count": members.len(),
                "avg_requests": members.iter().map(|m| m.request_rate).sum::<f64>() / count,
                "avg_bytes": members.iter().map(|m| m.avg_bytes).sum::<f64>() / count,
                "avg_error_rate": members.iter().map(|m| m.error_rate).sum::<f64>() / count,
                "cluster_name": members[0].cluster_name.clone(),
            }),
        );
    }

    drop(grouped);

    let total_users = insights.clusters.len();
    let data = json!({
        "clusters": insights.clusters,
        "cluster_stats": cluster_stats,
        "total_users": total_users,
        "generated_at": Utc::now(),
    });
    Ok(success("User clustering completed", data))
}

pub async fn realtime_anomaly(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ParserError> {
    require_get(&method)?;

    let raw = params
        .get("value")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ParserError::InvalidInput("Missing 'value' parameter".to_string()))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| ParserError::InvalidInput("Invalid 'value' parameter".to_string()))?;

    let result = state.ml.realtime_anomaly(value).await?;
    let data = json!({
        "value": value,
        "anomaly_score": result.anomaly_score,
        "is_anomaly": result.is_anomaly,
        "severity": result.severity,
        "timestamp": result.timestamp,
    });
    Ok(success("Real-time anomaly detection completed", data))
}

/// `GET` returns the active configuration, `POST` replaces it.
pub async fn config_endpoint(
    State(state): State<AppState>,
    method: Method,
    body: axum::body::Bytes,
) -> Result<Response, ParserError> {
    if method == Method::GET {
        let config = state.ml.config().await;
        Ok(success("ML configuration retrieved", json!(config)))
    } else if method == Method::POST {
        let config: MlConfig = serde_json::from_slice(&body)
            .map_err(|_| ParserError::InvalidInput("Invalid JSON payload".to_string()))?;
        state.ml.update_config(config.clone()).await;
        Ok(success(
            "ML configuration updated",
            json!({ "updated_config": config, "updated_at": Utc::now() }),
        ))
    } else {
        Err(ParserError::MethodNotAllowed(
            "Only GET, POST methods are allowed".to_string(),
        ))
    }
}
