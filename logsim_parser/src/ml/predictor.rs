//! Short-horizon traffic forecasting: an ensemble of linear regression,
//! exponential smoothing and seasonal averaging, with confidence from
//! back-tested MAPE.

use chrono::Duration;

use super::{mean, MlConfig, PredictionResult, TimeSeriesPoint, MIN_SERIES_POINTS};

/// Points used for the regression window.
const REGRESSION_WINDOW: usize = 30;
/// Smoothing factor for the exponential moving average.
const EMA_ALPHA: f64 = 0.3;
/// Per-step dampening applied to multi-step EMA forecasts.
const EMA_DAMPENING: f64 = 0.95;
/// Recency weight base for seasonal averaging.
const SEASONAL_RECENCY: f64 = 0.9;
const SEASONAL_PERIOD: usize = 24;

/// Forecasts `hours_ahead` hourly values past the end of the series.
pub fn predict(
    points: &[TimeSeriesPoint],
    hours_ahead: usize,
    config: &MlConfig,
) -> Vec<PredictionResult> {
    if points.len() < MIN_SERIES_POINTS {
        return Vec::new();
    }
    let horizon = if hours_ahead == 0 {
        if config.prediction_horizon == 0 {
            24
        } else {
            config.prediction_horizon
        }
    } else {
        hours_ahead
    };

    let last_time = points[points.len() - 1].timestamp;
    let margin = 1.96 * variance(points).sqrt();
    let confidence = confidence(points);

    (1..=horizon)
        .map(|step| {
            let linear = linear_regression(points, step);
            let smoothed = exp_moving_average(points, step);
            let seasonal = seasonal_forecast(points, step);
            let predicted = 0.4 * linear + 0.3 * smoothed + 0.3 * seasonal;

            PredictionResult {
                timestamp: last_time + Duration::hours(step as i64),
                predicted_value: predicted,
                confidence_level: confidence,
                lower_bound: predicted - margin,
                upper_bound: predicted + margin,
            }
        })
        .collect()
}

/// OLS over the trailing window, extrapolated `steps` past its end and
/// clamped non-negative.
fn linear_regression(points: &[TimeSeriesPoint], steps: usize) -> f64 {
    let n = points.len();
    if n < 2 {
        return points.last().map(|p| p.value).unwrap_or(0.0);
    }
    let window = REGRESSION_WINDOW.min(n);
    let recent = &points[n - window..];

    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, point) in recent.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += point.value;
        sum_xy += x * point.value;
        sum_x2 += x * x;
    }
    let count = recent.len() as f64;
    let denominator = count * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return recent[recent.len() - 1].value.max(0.0);
    }
    let slope = (count * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / count;

    let future_x = (recent.len() + steps - 1) as f64;
    (slope * future_x + intercept).max(0.0)
}

/// Exponentially smoothed series value, dampened per step ahead.
fn exp_moving_average(points: &[TimeSeriesPoint], steps: usize) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    let mut ema = first.value;
    for point in &points[1..] {
        ema = EMA_ALPHA * point.value + (1.0 - EMA_ALPHA) * ema;
    }
    ema * EMA_DAMPENING.powi(steps as i32 - 1)
}

/// Recency-weighted mean of prior same-phase values; falls back to the EMA
/// when the series is shorter than one cycle.
fn seasonal_forecast(points: &[TimeSeriesPoint], steps: usize) -> f64 {
    if points.len() < SEASONAL_PERIOD {
        return exp_moving_average(points, steps);
    }

    let target_phase = (points.len() + steps - 1) % SEASONAL_PERIOD;
    let mut seasonal_values = Vec::new();
    let mut i = target_phase;
    while i < points.len() {
        seasonal_values.push(points[i].value);
        i += SEASONAL_PERIOD;
    }
    if seasonal_values.is_empty() {
        return exp_moving_average(points, steps);
    }

    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (i, value) in seasonal_values.iter().enumerate() {
        let weight = SEASONAL_RECENCY.powi((seasonal_values.len() - i - 1) as i32);
        total += value * weight;
        weight_sum += weight;
    }
    total / weight_sum
}

/// `1 − MAPE` over one-step back-tests of the last ten points, clamped to
/// [0.1, 0.95].
fn confidence(points: &[TimeSeriesPoint]) -> f64 {
    if points.len() < MIN_SERIES_POINTS {
        return 0.5;
    }
    let recent = &points[points.len() - 10..];
    let mut errors = Vec::new();
    for i in 1..recent.len() {
        let actual = recent[i].value;
        let predicted = exp_moving_average(&recent[..i], 1);
        errors.push((actual - predicted).abs() / actual.max(1.0));
    }
    let mape = mean(&errors);
    (1.0 - mape).clamp(0.1, 0.95)
}

/// Sample variance of the series.
fn variance(points: &[TimeSeriesPoint]) -> f64 {
    if points.len() < 2 {
        return 1.0;
    }
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mean = mean(&values);
    let sum_squared_diff: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    sum_squared_diff / (values.len() - 1) as f64
}

/// Probability of anomalies in the next period, from the recent anomaly rate
/// scaled by the trend direction.
pub fn anomaly_probability(
    points: &[TimeSeriesPoint],
    anomalies: &[super::AnomalyResult],
) -> f64 {
    if points.len() < 24 || anomalies.is_empty() {
        return 0.1;
    }

    let recent_hours = 24;
    let cutoff = points[points.len() - 1].timestamp - Duration::hours(recent_hours);
    let recent_anomalies = anomalies
        .iter()
        .filter(|a| a.is_anomaly && a.timestamp > cutoff)
        .count();
    let anomaly_rate = recent_anomalies as f64 / recent_hours as f64;

    let trend = recent_trend(points);
    let trend_factor = if trend > 0.1 {
        1.2
    } else if trend < -0.1 {
        0.8
    } else {
        1.0
    };

    (anomaly_rate * trend_factor).clamp(0.05, 0.9)
}

/// Relative change between the two halves of the last ten points.
fn recent_trend(points: &[TimeSeriesPoint]) -> f64 {
    if points.len() < 10 {
        return 0.0;
    }
    let recent = &points[points.len() - 10..];
    let first_avg = mean(&recent[..5].iter().map(|p| p.value).collect::<Vec<_>>());
    let second_avg = mean(&recent[5..].iter().map(|p| p.value).collect::<Vec<_>>());
    if first_avg == 0.0 {
        return 0.0;
    }
    (second_avg - first_avg) / first_avg
}
