//! Synthetic combined-log line synthesis.
//!
//! Every categorical field is drawn uniformly from a fixed sample set so the
//! parser side sees a small, predictable vocabulary.

use chrono::{SecondsFormat, Utc};
use rand::Rng;

pub const SAMPLE_IPS: &[&str] = &["192.168.1.1", "192.168.1.2", "10.0.0.1"];

pub const SAMPLE_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];

pub const SAMPLE_PATHS: &[&str] = &["/home", "/login", "/profile", "/dashboard"];

pub const SAMPLE_STATUSES: &[i32] = &[200, 404, 500, 301];

pub const SAMPLE_REFERRERS: &[&str] = &[
    "-",
    "https://www.google.com",
    "https://www.bing.com",
    "https://www.example.com",
];

pub const SAMPLE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/18.18362",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_4) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/80.0.3987.132 Safari/537.36",
];

/// Generates one access-log line in combined-log format with the current UTC
/// instant as its timestamp.
pub fn generate_line<R: Rng>(rng: &mut R) -> String {
    let ip = SAMPLE_IPS[rng.gen_range(0..SAMPLE_IPS.len())];
    let method = SAMPLE_METHODS[rng.gen_range(0..SAMPLE_METHODS.len())];
    let path = SAMPLE_PATHS[rng.gen_range(0..SAMPLE_PATHS.len())];
    let status = SAMPLE_STATUSES[rng.gen_range(0..SAMPLE_STATUSES.len())];
    let body_bytes = rng.gen_range(500..1500);
    let referrer = SAMPLE_REFERRERS[rng.gen_range(0..SAMPLE_REFERRERS.len())];
    let agent = SAMPLE_USER_AGENTS[rng.gen_range(0..SAMPLE_USER_AGENTS.len())];
    let forwarded_for = format!(
        "{}.{}.{}.{}",
        rng.gen_range(0..256),
        rng.gen_range(0..256),
        rng.gen_range(0..256),
        rng.gen_range(0..256)
    );
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    format!(
        "{} - - [{}] \"{} {} HTTP/1.1\" {} {} \"{}\" \"{}\" \"{}\"",
        ip, timestamp, method, path, status, body_bytes, referrer, agent, forwarded_for
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn line_has_combined_log_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let line = generate_line(&mut rng);
            // four quoted fields -> nine '"'-separated segments
            assert_eq!(line.split('"').count(), 9, "line: {}", line);
            assert!(line.contains(" - - ["));
            assert!(line.contains("HTTP/1.1"));
        }
    }

    #[test]
    fn fields_come_from_sample_sets() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let line = generate_line(&mut rng);
            let ip = line.split_whitespace().next().unwrap();
            assert!(SAMPLE_IPS.contains(&ip));

            let status_bytes: Vec<&str> = line
                .split('"')
                .nth(2)
                .unwrap()
                .split_whitespace()
                .collect();
            let status: i32 = status_bytes[0].parse().unwrap();
            let bytes: i32 = status_bytes[1].parse().unwrap();
            assert!(SAMPLE_STATUSES.contains(&status));
            assert!((500..1500).contains(&bytes));
        }
    }

    #[test]
    fn timestamp_is_rfc3339_seconds() {
        let mut rng = StdRng::seed_from_u64(3);
        let line = generate_line(&mut rng);
        let start = line.find('[').unwrap() + 1;
        let end = line.find(']').unwrap();
        let stamp = &line[start..end];
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(!stamp.contains('.'), "no sub-second precision: {}", stamp);
    }
}
