//! Pattern- and behavior-based threat scoring over raw log rows.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::LogRecord;

use super::SecurityThreat;

/// Requests per trailing minute that count as a rate violation.
pub const RATE_LIMIT_PER_MINUTE: usize = 100;

struct AttackPattern {
    name: &'static str,
    pattern: Regex,
    severity: &'static str,
    description: &'static str,
}

static ATTACK_PATTERNS: Lazy<Vec<AttackPattern>> = Lazy::new(|| {
    vec![
        AttackPattern {
            name: "SQL Injection",
            pattern: Regex::new(r"(?i)(union|select|insert|delete|drop|exec|script|javascript|<script)")
                .expect("valid pattern"),
            severity: "high",
            description: "Potential SQL injection or XSS attempt",
        },
        AttackPattern {
            name: "Directory Traversal",
            pattern: Regex::new(r"\.\./|\.\.\\|%2e%2e%2f|%2e%2e\\").expect("valid pattern"),
            severity: "medium",
            description: "Directory traversal attempt",
        },
        AttackPattern {
            name: "Command Injection",
            pattern: Regex::new(r"(?i)(;|&&|\|\||cmd|powershell|bash|sh|exec)").expect("valid pattern"),
            severity: "high",
            description: "Command injection attempt",
        },
        AttackPattern {
            name: "Brute Force",
            pattern: Regex::new(r"(?i)(admin|login|wp-admin|administrator)").expect("valid pattern"),
            severity: "medium",
            description: "Potential brute force attack",
        },
        AttackPattern {
            name: "Bot Activity",
            pattern: Regex::new(r"(?i)(bot|crawler|spider|scraper|scanner)").expect("valid pattern"),
            severity: "low",
            description: "Automated bot activity",
        },
    ]
});

const SUSPICIOUS_AGENTS: &[&str] = &[
    "sqlmap",
    "nikto",
    "nmap",
    "masscan",
    "zap",
    "burp",
    "python-requests",
    "curl",
    "wget",
    "scanner",
];

/// Per-IP running counters for the behavior scorer. Held in memory for one
/// analysis run only.
#[derive(Debug)]
struct IpBehavior {
    request_count: usize,
    error_count: usize,
    unique_endpoints: HashSet<String>,
    user_agents: HashSet<String>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl IpBehavior {
    fn new(seen: DateTime<Utc>) -> Self {
        Self {
            request_count: 0,
            error_count: 0,
            unique_endpoints: HashSet::new(),
            user_agents: HashSet::new(),
            first_seen: seen,
            last_seen: seen,
        }
    }

    fn suspicion_score(&self) -> f64 {
        let mut score = 0.0;
        if self.request_count > 0 {
            let error_rate = self.error_count as f64 / self.request_count as f64;
            if error_rate > 0.5 {
                score += 0.3;
            }
        }
        if self.unique_endpoints.len() > 50 {
            score += 0.2;
        }
        if self.user_agents.len() > 5 {
            score += 0.2;
        }
        let duration = self.last_seen - self.first_seen;
        let hours = duration.num_milliseconds() as f64 / 3_600_000.0;
        if hours > 0.0 && self.request_count as f64 / hours > 100.0 {
            score += 0.3;
        }
        score
    }
}

/// Runs all detectors and consolidates duplicate `(ip, type)` findings.
pub fn analyze(logs: &[LogRecord]) -> Vec<SecurityThreat> {
    let behaviors = build_behaviors(logs);

    let mut threats = Vec::new();
    threats.extend(detect_attack_patterns(logs));
    threats.extend(detect_rate_violations(logs));
    threats.extend(detect_suspicious_behavior(&behaviors));
    threats.extend(detect_suspicious_agents(logs));
    consolidate(threats)
}

fn build_behaviors(logs: &[LogRecord]) -> BTreeMap<String, IpBehavior> {
    let mut behaviors: BTreeMap<String, IpBehavior> = BTreeMap::new();
    for log in logs {
        let behavior = behaviors
            .entry(log.remote_addr.clone())
            .or_insert_with(|| IpBehavior::new(log.time_local));
        behavior.request_count += 1;
        if log.time_local < behavior.first_seen {
            behavior.first_seen = log.time_local;
        }
        if log.time_local > behavior.last_seen {
            behavior.last_seen = log.time_local;
        }
        if log.status >= 400 {
            behavior.error_count += 1;
        }
        behavior
            .unique_endpoints
            .insert(extract_endpoint(&log.request).to_string());
        behavior.user_agents.insert(log.http_user_agent.clone());
    }
    behaviors
}

fn detect_attack_patterns(logs: &[LogRecord]) -> Vec<SecurityThreat> {
    let mut threats = Vec::new();
    for log in logs {
        for pattern in ATTACK_PATTERNS.iter() {
            if pattern.pattern.is_match(&log.request)
                || pattern.pattern.is_match(&log.http_user_agent)
                || pattern.pattern.is_match(&log.http_referer)
            {
                threats.push(SecurityThreat {
                    threat_type: pattern.name.to_string(),
                    ip_address: log.remote_addr.clone(),
                    severity: pattern.severity,
                    confidence: 0.8,
                    description: pattern.description.to_string(),
                    first_seen: log.time_local,
                    last_seen: log.time_local,
                    request_count: 1,
                });
            }
        }
    }
    threats
}

/// Flags IPs with more than [`RATE_LIMIT_PER_MINUTE`] requests inside any
/// trailing 60-second window.
fn detect_rate_violations(logs: &[LogRecord]) -> Vec<SecurityThreat> {
    let mut per_ip: BTreeMap<&str, Vec<DateTime<Utc>>> = BTreeMap::new();
    for log in logs {
        per_ip.entry(&log.remote_addr).or_default().push(log.time_local);
    }

    let mut threats = Vec::new();
    for (ip, mut times) in per_ip {
        if times.len() <= RATE_LIMIT_PER_MINUTE {
            continue;
        }
        times.sort_unstable();
        let window = Duration::seconds(60);
        let mut start = 0;
        let mut violated = false;
        for end in 0..times.len() {
            while times[end] - times[start] > window {
                start += 1;
            }
            if end - start + 1 > RATE_LIMIT_PER_MINUTE {
                violated = true;
                break;
            }
        }
        if violated {
            threats.push(SecurityThreat {
                threat_type: "Rate Limit Violation".to_string(),
                ip_address: ip.to_string(),
                severity: "high",
                confidence: 0.9,
                description: "Excessive request rate detected".to_string(),
                first_seen: times[0],
                last_seen: times[times.len() - 1],
                request_count: times.len(),
            });
        }
    }
    threats
}

fn detect_suspicious_behavior(behaviors: &BTreeMap<String, IpBehavior>) -> Vec<SecurityThreat> {
    let mut threats = Vec::new();
    for (ip, behavior) in behaviors {
        let score = behavior.suspicion_score();
        if score > 0.7 {
            let severity = if score > 0.9 { "high" } else { "medium" };
            threats.push(SecurityThreat {
                threat_type: "Suspicious IP Behavior".to_string(),
                ip_address: ip.clone(),
                severity,
                confidence: score,
                description: "IP showing suspicious behavior patterns".to_string(),
                first_seen: behavior.first_seen,
                last_seen: behavior.last_seen,
                request_count: behavior.request_count,
            });
        }
    }
    threats
}

fn detect_suspicious_agents(logs: &[LogRecord]) -> Vec<SecurityThreat> {
    let mut threats = Vec::new();
    for log in logs {
        let agent = log.http_user_agent.to_lowercase();
        for suspicious in SUSPICIOUS_AGENTS {
            if agent.contains(suspicious) {
                threats.push(SecurityThreat {
                    threat_type: "Suspicious User Agent".to_string(),
                    ip_address: log.remote_addr.clone(),
                    severity: "medium",
                    confidence: 0.7,
                    description: format!("Suspicious user agent detected: {}", suspicious),
                    first_seen: log.time_local,
                    last_seen: log.time_local,
                    request_count: 1,
                });
                break;
            }
        }
    }
    threats
}

/// Merges duplicate `(ip, type)` findings: the count accumulates, `last_seen`
/// advances, confidence keeps its maximum.
fn consolidate(threats: Vec<SecurityThreat>) -> Vec<SecurityThreat> {
    let mut merged: BTreeMap<(String, String), SecurityThreat> = BTreeMap::new();
    for threat in threats {
        let key = (threat.ip_address.clone(), threat.threat_type.clone());
        match merged.get_mut(&key) {
            Some(existing) => {
                existing.request_count += 1;
                if threat.last_seen > existing.last_seen {
                    existing.last_seen = threat.last_seen;
                }
                if threat.first_seen < existing.first_seen {
                    existing.first_seen = threat.first_seen;
                }
                if threat.confidence > existing.confidence {
                    existing.confidence = threat.confidence;
                }
            }
            None => {
                merged.insert(key, threat);
            }
        }
    }
    merged.into_values().collect()
}

fn extract_endpoint(request: &str) -> &str {
    let mut parts = request.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(_), Some(path)) => path,
        _ => request,
    }
}
