//! Statistical anomaly detection over the derived time series, combining a
//! z-score test with an IQR fence; a seasonal variant scores each point
//! against the same phase in earlier cycles.

use super::{mean, quartiles, std_dev, AnomalyResult, MlConfig, TimeSeriesPoint, MIN_SERIES_POINTS};

/// Points in the sliding window used for real-time scoring.
pub const REALTIME_WINDOW: usize = 50;

pub fn severity_for(score: f64) -> &'static str {
    if score < 0.3 {
        "normal"
    } else if score < 0.5 {
        "low"
    } else if score < 0.7 {
        "medium"
    } else if score < 0.9 {
        "high"
    } else {
        "critical"
    }
}

// a zero-deviation baseline makes any departure from the mean infinitely
// surprising; the score still clamps to 1
fn z_score(value: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        if value == mean {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        ((value - mean) / std_dev).abs()
    }
}

/// Flags points whose z-score exceeds the configured threshold or that fall
/// outside the 1.5×IQR fence. Returns one result per input point.
pub fn detect(points: &[TimeSeriesPoint], config: &MlConfig) -> Vec<AnomalyResult> {
    if points.len() < MIN_SERIES_POINTS {
        return Vec::new();
    }

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mean = mean(&values);
    let std_dev = std_dev(&values, mean);
    let (q1, q3) = quartiles(&values);
    let iqr = q3 - q1;
    let iqr_lower = q1 - 1.5 * iqr;
    let iqr_upper = q3 + 1.5 * iqr;
    let threshold = config.anomaly_threshold;

    points
        .iter()
        .map(|point| {
            let z = z_score(point.value, mean, std_dev);
            let is_z_anomaly = z > threshold;
            let is_iqr_anomaly = point.value < iqr_lower || point.value > iqr_upper;
            let score = (z / 5.0).min(1.0);
            AnomalyResult {
                timestamp: point.timestamp,
                value: point.value,
                is_anomaly: is_z_anomaly || is_iqr_anomaly,
                anomaly_score: score,
                threshold,
                severity: severity_for(score),
            }
        })
        .collect()
}

/// Scores one new point against a sliding window of recent history.
pub fn detect_realtime(
    history: &[TimeSeriesPoint],
    new_point: TimeSeriesPoint,
    config: &MlConfig,
) -> AnomalyResult {
    if history.len() < MIN_SERIES_POINTS {
        return AnomalyResult {
            timestamp: new_point.timestamp,
            value: new_point.value,
            is_anomaly: false,
            anomaly_score: 0.0,
            threshold: config.anomaly_threshold,
            severity: "normal",
        };
    }

    let window = REALTIME_WINDOW.min(history.len());
    let values: Vec<f64> = history[history.len() - window..]
        .iter()
        .map(|p| p.value)
        .collect();
    let mean = mean(&values);
    let std_dev = std_dev(&values, mean);

    let z = z_score(new_point.value, mean, std_dev);
    let score = (z / 5.0).min(1.0);
    AnomalyResult {
        timestamp: new_point.timestamp,
        value: new_point.value,
        is_anomaly: z > config.anomaly_threshold,
        anomaly_score: score,
        threshold: config.anomaly_threshold,
        severity: severity_for(score),
    }
}

/// Seasonal variant: the baseline for index `i` is the set of values at the
/// same phase in earlier cycles. Needs two full cycles of history, otherwise
/// falls back to the plain detector.
pub fn detect_seasonal(
    points: &[TimeSeriesPoint],
    period: usize,
    config: &MlConfig,
) -> Vec<AnomalyResult> {
    if period == 0 || points.len() < period * 2 {
        return detect(points, config);
    }

    let mut results = Vec::new();
    for i in period..points.len() {
        let mut seasonal_values = Vec::new();
        let mut j = i % period;
        while j < i {
            seasonal_values.push(points[j].value);
            j += period;
        }
        if seasonal_values.len() < 3 {
            continue;
        }

        let seasonal_mean = mean(&seasonal_values);
        let seasonal_std = std_dev(&seasonal_values, seasonal_mean);
        let z = z_score(points[i].value, seasonal_mean, seasonal_std);
        let threshold = config.seasonal_threshold;
        let score = (z / 4.0).min(1.0);

        results.push(AnomalyResult {
            timestamp: points[i].timestamp,
            value: points[i].value,
            is_anomaly: z > threshold,
            anomaly_score: score,
            threshold,
            severity: severity_for(score),
        });
    }
    results
}
