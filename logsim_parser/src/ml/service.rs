//! Orchestrates the analytics components over rows fetched from the store.

use chrono::{DateTime, DurationRound, Timelike, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::database::Database;
use crate::error::ParserError;
use crate::models::LogRecord;

use super::{
    anomaly, clustering, mean, predictor, security, LogMetrics, MlConfig, MlInsights,
    TimeSeriesPoint, TrendAnalysis, MIN_SERIES_POINTS,
};

/// Row cap for one analysis run.
pub const RECENT_LOG_LIMIT: i64 = 10_000;
/// Default trailing window in hours.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;
/// Largest accepted trailing window (one week).
pub const MAX_WINDOW_HOURS: i64 = 168;

/// One of the four per-minute series the analytics run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeriesKey {
    #[default]
    RequestsPerMinute,
    ErrorRate,
    AvgResponseSize,
    UniqueIps,
}

impl SeriesKey {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "requests_per_minute" => Some(SeriesKey::RequestsPerMinute),
            "error_rate" => Some(SeriesKey::ErrorRate),
            "avg_response_size" => Some(SeriesKey::AvgResponseSize),
            "unique_ips" => Some(SeriesKey::UniqueIps),
            _ => None,
        }
    }

    fn select<'a>(&self, metrics: &'a LogMetrics) -> &'a [TimeSeriesPoint] {
        match self {
            SeriesKey::RequestsPerMinute => &metrics.requests_per_minute,
            SeriesKey::ErrorRate => &metrics.error_rate,
            SeriesKey::AvgResponseSize => &metrics.avg_response_size,
            SeriesKey::UniqueIps => &metrics.unique_ips,
        }
    }
}

pub struct MlService {
    db: Database,
    table: String,
    config: RwLock<MlConfig>,
}

impl MlService {
    pub fn new(db: Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
            config: RwLock::new(MlConfig::default()),
        }
    }

    pub async fn config(&self) -> MlConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, config: MlConfig) {
        *self.config.write().await = config;
        info!("analytics configuration updated");
    }

    /// Runs every analytic over the trailing window. Sparse data degrades to
    /// empty component results, never to an error.
    pub async fn generate_insights(&self, hours: i64) -> Result<MlInsights, ParserError> {
        let logs = self
            .db
            .fetch_recent(&self.table, hours, RECENT_LOG_LIMIT)
            .await?;
        let config = self.config().await;

        if logs.is_empty() {
            return Ok(empty_insights());
        }

        let metrics = derive_metrics(&logs);
        let anomalies = anomaly::detect(&metrics.requests_per_minute, &config);
        let predictions = predictor::predict(
            &metrics.requests_per_minute,
            config.prediction_horizon,
            &config,
        );
        let security_threats = security::analyze(&logs);
        let clusters = clustering::cluster_users(&logs, &config);
        let trend_analysis = trend_analysis(&metrics.requests_per_minute);

        info!(
            "generated insights: {} anomalies, {} predictions, {} threats, {} cluster assignments",
            anomalies.len(),
            predictions.len(),
            security_threats.len(),
            clusters.len()
        );

        Ok(MlInsights {
            anomalies,
            predictions,
            trend_analysis,
            clusters,
            security_threats,
            generated_at: Utc::now(),
        })
    }

    /// Forecasts `hours_ahead` hourly values from the trailing day of traffic.
    pub async fn predictions(
        &self,
        hours_ahead: usize,
    ) -> Result<(Vec<super::PredictionResult>, TrendAnalysis), ParserError> {
        let logs = self
            .db
            .fetch_recent(&self.table, DEFAULT_WINDOW_HOURS, RECENT_LOG_LIMIT)
            .await?;
        let config = self.config().await;
        let metrics = derive_metrics(&logs);
        let predictions = predictor::predict(&metrics.requests_per_minute, hours_ahead, &config);
        let trend = trend_analysis(&metrics.requests_per_minute);
        Ok((predictions, trend))
    }

    /// Anomaly pass over one of the derived series, optionally seasonal.
    pub async fn anomalies(
        &self,
        hours: i64,
        series: SeriesKey,
        seasonal: bool,
    ) -> Result<Vec<super::AnomalyResult>, ParserError> {
        let logs = self
            .db
            .fetch_recent(&self.table, hours, RECENT_LOG_LIMIT)
            .await?;
        let config = self.config().await;
        let metrics = derive_metrics(&logs);
        let points = series.select(&metrics);
        Ok(if seasonal {
            anomaly::detect_seasonal(points, config.seasonal_period, &config)
        } else {
            anomaly::detect(points, &config)
        })
    }

    /// Scores a single value against the last hour of traffic.
    pub async fn realtime_anomaly(&self, value: f64) -> Result<super::AnomalyResult, ParserError> {
        let logs = self.db.fetch_recent(&self.table, 1, RECENT_LOG_LIMIT).await?;
        let config = self.config().await;
        let metrics = derive_metrics(&logs);
        Ok(anomaly::detect_realtime(
            &metrics.requests_per_minute,
            TimeSeriesPoint {
                timestamp: Utc::now(),
                value,
            },
            &config,
        ))
    }
}

fn empty_insights() -> MlInsights {
    MlInsights {
        anomalies: Vec::new(),
        predictions: Vec::new(),
        trend_analysis: insufficient_trend(),
        clusters: Vec::new(),
        security_threats: Vec::new(),
        generated_at: Utc::now(),
    }
}

fn insufficient_trend() -> TrendAnalysis {
    TrendAnalysis {
        period: "insufficient_data".to_string(),
        trend: "unknown",
        slope: 0.0,
        correlation: 0.0,
        seasonality: false,
    }
}

/// Buckets rows into minutes and derives the four series, each sorted
/// ascending by minute.
pub fn derive_metrics(logs: &[LogRecord]) -> LogMetrics {
    let mut buckets: BTreeMap<DateTime<Utc>, Vec<&LogRecord>> = BTreeMap::new();
    for log in logs {
        let minute = log
            .time_local
            .duration_trunc(chrono::Duration::minutes(1))
            .unwrap_or(log.time_local);
        buckets.entry(minute).or_default().push(log);
    }

    let mut metrics = LogMetrics::default();
    for (minute, rows) in buckets {
        let request_count = rows.len() as f64;
        let error_count = rows.iter().filter(|r| r.status >= 400).count() as f64;
        let total_bytes: i64 = rows.iter().map(|r| i64::from(r.body_bytes_sent)).sum();
        let unique_ips = rows
            .iter()
            .map(|r| r.remote_addr.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len() as f64;

        metrics.requests_per_minute.push(TimeSeriesPoint {
            timestamp: minute,
            value: request_count,
        });
        metrics.error_rate.push(TimeSeriesPoint {
            timestamp: minute,
            value: error_count / request_count * 100.0,
        });
        metrics.avg_response_size.push(TimeSeriesPoint {
            timestamp: minute,
            value: total_bytes as f64 / request_count,
        });
        metrics.unique_ips.push(TimeSeriesPoint {
            timestamp: minute,
            value: unique_ips,
        });
    }
    metrics
}

/// OLS slope, Pearson correlation, and an hourly-variance seasonality flag.
pub fn trend_analysis(points: &[TimeSeriesPoint]) -> TrendAnalysis {
    if points.len() < MIN_SERIES_POINTS {
        return insufficient_trend();
    }

    let slope = slope(points);
    let trend = if slope > 0.1 {
        "increasing"
    } else if slope < -0.1 {
        "decreasing"
    } else {
        "stable"
    };

    TrendAnalysis {
        period: "24h".to_string(),
        trend,
        slope,
        correlation: correlation(points),
        seasonality: detect_seasonality(points),
    }
}

fn slope(points: &[TimeSeriesPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, point) in points.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += point.value;
        sum_xy += x * point.value;
        sum_x2 += x * x;
    }
    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denominator
    }
}

fn correlation(points: &[TimeSeriesPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (i, point) in points.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += point.value;
        sum_xy += x * point.value;
        sum_x2 += x * x;
        sum_y2 += point.value * point.value;
    }
    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// True when the variance of per-hour means exceeds a tenth of the grand mean.
fn detect_seasonality(points: &[TimeSeriesPoint]) -> bool {
    if points.len() < 24 {
        return false;
    }

    let mut hourly: Vec<Vec<f64>> = vec![Vec::new(); 24];
    for point in points {
        hourly[point.timestamp.hour() as usize].push(point.value);
    }

    let hour_means: Vec<f64> = hourly
        .iter()
        .map(|values| if values.is_empty() { 0.0 } else { mean(values) })
        .collect();

    let grand_mean = mean(&hour_means);
    let variance = hour_means
        .iter()
        .map(|m| (m - grand_mean) * (m - grand_mean))
        .sum::<f64>()
        / 24.0;

    variance > grand_mean * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(ip: &str, status: i32, bytes: i32, offset_secs: i64) -> LogRecord {
        LogRecord {
            id: 1,
            remote_addr: ip.to_string(),
            remote_user: "-".to_string(),
            time_local: Utc.with_ymd_and_hms(2025, 4, 10, 12, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            request: "GET /home HTTP/1.1".to_string(),
            status,
            body_bytes_sent: bytes,
            http_referer: "-".to_string(),
            http_user_agent: "UA".to_string(),
            http_x_forwarded_for: "1.1.1.1".to_string(),
        }
    }

    fn series(values: &[f64]) -> Vec<TimeSeriesPoint> {
        let base = Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| TimeSeriesPoint {
                timestamp: base + Duration::minutes(i as i64),
                value,
            })
            .collect()
    }

    #[test]
    fn metrics_bucket_to_minutes_sorted() {
        let logs = vec![
            record("10.0.0.1", 200, 100, 70), // second minute
            record("10.0.0.1", 200, 300, 0),  // first minute
            record("10.0.0.2", 404, 500, 5),
            record("10.0.0.1", 200, 100, 10),
        ];
        let metrics = derive_metrics(&logs);
        assert_eq!(metrics.requests_per_minute.len(), 2);
        // ascending minutes
        assert!(metrics.requests_per_minute[0].timestamp < metrics.requests_per_minute[1].timestamp);
        assert_eq!(metrics.requests_per_minute[0].value, 3.0);
        assert_eq!(metrics.requests_per_minute[1].value, 1.0);
        assert!((metrics.error_rate[0].value - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(metrics.avg_response_size[0].value, 300.0);
        assert_eq!(metrics.unique_ips[0].value, 2.0);
        assert_eq!(metrics.unique_ips[1].value, 1.0);
    }

    #[test]
    fn empty_logs_derive_empty_metrics() {
        let metrics = derive_metrics(&[]);
        assert!(metrics.requests_per_minute.is_empty());
        assert!(metrics.error_rate.is_empty());
    }

    #[test]
    fn series_keys_parse_and_select() {
        assert_eq!(
            SeriesKey::parse("requests_per_minute"),
            Some(SeriesKey::RequestsPerMinute)
        );
        assert_eq!(SeriesKey::parse("error_rate"), Some(SeriesKey::ErrorRate));
        assert_eq!(
            SeriesKey::parse("avg_response_size"),
            Some(SeriesKey::AvgResponseSize)
        );
        assert_eq!(SeriesKey::parse("unique_ips"), Some(SeriesKey::UniqueIps));
        assert_eq!(SeriesKey::parse("nope"), None);

        let logs = vec![record("10.0.0.1", 404, 100, 0)];
        let metrics = derive_metrics(&logs);
        assert_eq!(SeriesKey::ErrorRate.select(&metrics)[0].value, 100.0);
        assert_eq!(SeriesKey::UniqueIps.select(&metrics)[0].value, 1.0);
    }

    #[test]
    fn trend_labels_follow_the_slope() {
        let rising: Vec<f64> = (0..30).map(|i| i as f64).collect();
        assert_eq!(trend_analysis(&series(&rising)).trend, "increasing");

        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        assert_eq!(trend_analysis(&series(&falling)).trend, "decreasing");

        assert_eq!(trend_analysis(&series(&[5.0; 30])).trend, "stable");
    }

    #[test]
    fn short_series_reports_insufficient_data() {
        let analysis = trend_analysis(&series(&[1.0; 5]));
        assert_eq!(analysis.period, "insufficient_data");
        assert_eq!(analysis.trend, "unknown");
    }

    #[test]
    fn correlation_is_signed_and_bounded() {
        let rising: Vec<f64> = (0..30).map(|i| i as f64 * 2.0).collect();
        let c = correlation(&series(&rising));
        assert!((c - 1.0).abs() < 1e-9);

        let falling: Vec<f64> = (0..30).map(|i| 60.0 - i as f64).collect();
        let c = correlation(&series(&falling));
        assert!((c + 1.0).abs() < 1e-9);
    }

    #[test]
    fn hourly_pattern_flags_seasonality() {
        // one point per minute over 24 hours, busy only during two hours
        let base = Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap();
        let points: Vec<TimeSeriesPoint> = (0..24 * 60)
            .map(|i| {
                let timestamp = base + Duration::minutes(i);
                let hour = (i / 60) % 24;
                let value = if hour == 9 || hour == 10 { 500.0 } else { 5.0 };
                TimeSeriesPoint { timestamp, value }
            })
            .collect();
        assert!(detect_seasonality(&points));

        // flat traffic across the whole day is not seasonal
        let flat: Vec<TimeSeriesPoint> = (0..24 * 60)
            .map(|i| TimeSeriesPoint {
                timestamp: base + Duration::minutes(i),
                value: 10.0,
            })
            .collect();
        assert!(!detect_seasonality(&flat));
    }
}
