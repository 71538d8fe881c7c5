//! Statistical analytics over stored log rows: anomaly detection, traffic
//! forecasting, threat scoring and user clustering. Everything here is
//! recomputed from raw rows on each request; nothing is trained or persisted.

pub mod anomaly;
pub mod clustering;
pub mod handlers;
pub mod predictor;
pub mod security;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum series length any analytic needs; shorter input degrades to an
/// empty result rather than an error.
pub const MIN_SERIES_POINTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyResult {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub is_anomaly: bool,
    pub anomaly_score: f64,
    pub threshold: f64,
    pub severity: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub timestamp: DateTime<Utc>,
    pub predicted_value: f64,
    pub confidence_level: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendAnalysis {
    pub period: String,
    pub trend: &'static str,
    pub slope: f64,
    pub correlation: f64,
    pub seasonality: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterResult {
    pub cluster_id: usize,
    pub cluster_name: String,
    pub ip_address: String,
    pub request_rate: f64,
    pub avg_bytes: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityThreat {
    pub threat_type: String,
    pub ip_address: String,
    pub severity: &'static str,
    pub confidence: f64,
    pub description: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub request_count: usize,
}

/// The four per-minute series derived from raw rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogMetrics {
    pub requests_per_minute: Vec<TimeSeriesPoint>,
    pub error_rate: Vec<TimeSeriesPoint>,
    pub avg_response_size: Vec<TimeSeriesPoint>,
    pub unique_ips: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MlInsights {
    pub anomalies: Vec<AnomalyResult>,
    pub predictions: Vec<PredictionResult>,
    pub trend_analysis: TrendAnalysis,
    pub clusters: Vec<ClusterResult>,
    pub security_threats: Vec<SecurityThreat>,
    pub generated_at: DateTime<Utc>,
}

/// Tunables for the analytics engine. Swapped atomically under a
/// reader/writer guard when updated over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    /// Z-score threshold for the plain detector.
    pub anomaly_threshold: f64,
    /// Z-score threshold for the seasonal detector.
    pub seasonal_threshold: f64,
    /// Positions per seasonal cycle.
    pub seasonal_period: usize,
    /// Forecast horizon in hours.
    pub prediction_horizon: usize,
    /// K for user clustering.
    pub cluster_count: usize,
    pub security_sensitivity: String,
    /// Fixed seed for K-means++ initialization; `None` draws from entropy.
    pub cluster_seed: Option<u64>,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 2.5,
            seasonal_threshold: 2.0,
            seasonal_period: 24,
            prediction_horizon: 24,
            cluster_count: 3,
            security_sensitivity: "medium".to_string(),
            cluster_seed: None,
        }
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_squared_diff: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_squared_diff / values.len() as f64).sqrt()
}

pub(crate) fn quartiles(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    (sorted[n / 4], sorted[3 * n / 4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_eq!(m, 5.0);
        assert_eq!(std_dev(&values, m), 2.0);
    }

    #[test]
    fn empty_input_is_safe() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[], 0.0), 0.0);
    }

    #[test]
    fn quartile_positions() {
        let values: Vec<f64> = (1..=8).map(f64::from).collect();
        let (q1, q3) = quartiles(&values);
        assert_eq!(q1, 3.0);
        assert_eq!(q3, 7.0);
    }

    #[test]
    fn config_defaults() {
        let config = MlConfig::default();
        assert_eq!(config.anomaly_threshold, 2.5);
        assert_eq!(config.seasonal_period, 24);
        assert_eq!(config.prediction_horizon, 24);
        assert_eq!(config.cluster_count, 3);
        assert!(config.cluster_seed.is_none());
    }
}
