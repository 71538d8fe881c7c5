//! K-means clustering of per-IP behavior profiles.
//!
//! Profiles use five features (request rate, average bytes, error rate,
//! unique pages, estimated session time), min-max normalized per feature.
//! Seeding is K-means++ over a seedable RNG so assignments are reproducible
//! when a fixed seed is configured.

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::LogRecord;

use super::{ClusterResult, MlConfig};

const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_TOLERANCE: f64 = 0.001;
const FEATURES: usize = 5;

pub const CLUSTER_NAMES: [&str; 5] = [
    "Light Users",
    "Medium Users",
    "Heavy Users",
    "Power Users",
    "Suspicious Users",
];

/// Aggregated per-IP behavior, the clustering input.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub ip_address: String,
    pub request_count: usize,
    pub error_count: usize,
    pub unique_pages: usize,
    pub total_bytes: u64,
}

impl UserProfile {
    pub fn request_rate(&self) -> f64 {
        self.request_count as f64
    }

    pub fn avg_bytes(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.request_count as f64
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.request_count as f64 * 100.0
        }
    }

    /// Rough session-time estimate derived from volume.
    pub fn session_time(&self) -> f64 {
        self.request_count as f64 / 10.0
    }

    fn features(&self) -> [f64; FEATURES] {
        [
            self.request_rate(),
            self.avg_bytes(),
            self.error_rate(),
            self.unique_pages as f64,
            self.session_time(),
        ]
    }
}

/// Clusters the per-IP profiles found in `logs`. Fewer than three distinct
/// IPs yields no clusters.
pub fn cluster_users(logs: &[LogRecord], config: &MlConfig) -> Vec<ClusterResult> {
    let profiles = extract_profiles(logs);
    if profiles.len() < 3 {
        return Vec::new();
    }

    let k = config.cluster_count.max(1).min(profiles.len());
    let features: Vec<[f64; FEATURES]> = profiles.iter().map(UserProfile::features).collect();
    let normalized = normalize(&features);

    let mut rng = match config.cluster_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let assignments = k_means(&normalized, k, &mut rng);

    profiles
        .iter()
        .zip(assignments)
        .map(|(profile, cluster_id)| ClusterResult {
            cluster_id,
            cluster_name: CLUSTER_NAMES
                .get(cluster_id)
                .copied()
                .unwrap_or("Unknown")
                .to_string(),
            ip_address: profile.ip_address.clone(),
            request_rate: profile.request_rate(),
            avg_bytes: profile.avg_bytes(),
            error_rate: profile.error_rate(),
        })
        .collect()
}

/// Aggregates rows into per-IP profiles, ordered by address for determinism.
pub fn extract_profiles(logs: &[LogRecord]) -> Vec<UserProfile> {
    struct Accumulator {
        request_count: usize,
        error_count: usize,
        pages: HashSet<String>,
        total_bytes: u64,
    }

    let mut per_ip: BTreeMap<String, Accumulator> = BTreeMap::new();
    for log in logs {
        let acc = per_ip.entry(log.remote_addr.clone()).or_insert(Accumulator {
            request_count: 0,
            error_count: 0,
            pages: HashSet::new(),
            total_bytes: 0,
        });
        acc.request_count += 1;
        if log.status >= 400 {
            acc.error_count += 1;
        }
        acc.pages.insert(extract_page(&log.request).to_string());
        acc.total_bytes += log.body_bytes_sent.max(0) as u64;
    }

    per_ip
        .into_iter()
        .map(|(ip_address, acc)| UserProfile {
            ip_address,
            request_count: acc.request_count,
            error_count: acc.error_count,
            unique_pages: acc.pages.len(),
            total_bytes: acc.total_bytes,
        })
        .collect()
}

fn extract_page(request: &str) -> &str {
    let mut parts = request.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(_), Some(path)) => path,
        _ => request,
    }
}

/// Per-feature min-max scaling to [0, 1]; a constant feature maps to 0.
fn normalize(features: &[[f64; FEATURES]]) -> Vec<[f64; FEATURES]> {
    let mut mins = [f64::INFINITY; FEATURES];
    let mut maxs = [f64::NEG_INFINITY; FEATURES];
    for row in features {
        for (i, value) in row.iter().enumerate() {
            mins[i] = mins[i].min(*value);
            maxs[i] = maxs[i].max(*value);
        }
    }

    features
        .iter()
        .map(|row| {
            let mut scaled = [0.0; FEATURES];
            for i in 0..FEATURES {
                if maxs[i] > mins[i] {
                    scaled[i] = (row[i] - mins[i]) / (maxs[i] - mins[i]);
                }
            }
            scaled
        })
        .collect()
}

fn distance(a: &[f64; FEATURES], b: &[f64; FEATURES]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn k_means(points: &[[f64; FEATURES]], k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut centers = init_centers(points, k, rng);
    let mut assignments = assign(points, &centers);

    for _ in 0..MAX_ITERATIONS {
        centers = update_centers(points, &assignments, k);
        let next = assign(points, &centers);

        let changes = assignments
            .iter()
            .zip(next.iter())
            .filter(|(a, b)| a != b)
            .count();
        let change_rate = changes as f64 / points.len() as f64;
        assignments = next;
        if change_rate < CONVERGENCE_TOLERANCE {
            break;
        }
    }
    assignments
}

/// K-means++ seeding: later centers are drawn with probability proportional
/// to squared distance from the nearest existing center.
fn init_centers(points: &[[f64; FEATURES]], k: usize, rng: &mut StdRng) -> Vec<[f64; FEATURES]> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    while centers.len() < k {
        let distances: Vec<f64> = points
            .iter()
            .map(|point| {
                centers
                    .iter()
                    .map(|center| distance(point, center))
                    .fold(f64::INFINITY, f64::min)
                    .powi(2)
            })
            .collect();
        let total: f64 = distances.iter().sum();
        if total == 0.0 {
            // all points coincide with existing centers
            centers.push(points[rng.gen_range(0..points.len())]);
            continue;
        }

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, weight) in distances.iter().enumerate() {
            target -= weight;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centers.push(points[chosen]);
    }
    centers
}

fn assign(points: &[[f64; FEATURES]], centers: &[[f64; FEATURES]]) -> Vec<usize> {
    points
        .iter()
        .map(|point| {
            let mut best = 0;
            let mut best_distance = f64::INFINITY;
            for (i, center) in centers.iter().enumerate() {
                let d = distance(point, center);
                if d < best_distance {
                    best_distance = d;
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Recomputes centroids; a cluster left empty keeps the origin, which is
/// permitted.
fn update_centers(
    points: &[[f64; FEATURES]],
    assignments: &[usize],
    k: usize,
) -> Vec<[f64; FEATURES]> {
    let mut centers = vec![[0.0; FEATURES]; k];
    let mut counts = vec![0usize; k];
    for (point, &cluster) in points.iter().zip(assignments) {
        for i in 0..FEATURES {
            centers[cluster][i] += point[i];
        }
        counts[cluster] += 1;
    }
    for (center, count) in centers.iter_mut().zip(counts) {
        if count > 0 {
            for value in center.iter_mut() {
                *value /= count as f64;
            }
        }
    }
    centers
}
