//! Combined-log line decoding.
//!
//! A single anchored pattern covers the whole grammar. Anything that does not
//! match — a missing field, an empty quoted field, a non-numeric status or
//! byte count, an unparseable timestamp — is dropped, never zero-filled.

use chrono::{DateTime, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::NewLog;

static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^(\S+) - (\S+) \[([^\]]+)\] "([^"]+)" (\d{3}) (\d+) "([^"]+)" "([^"]+)" "([^"]+)"$"#,
    )
    .expect("log line pattern is valid")
});

/// Parses one access-log line. `None` is the drop sentinel.
pub fn parse_line(line: &str) -> Option<NewLog> {
    let caps = LINE_PATTERN.captures(line)?;

    let time_local = DateTime::parse_from_rfc3339(&caps[3])
        .ok()?
        .with_timezone(&Utc)
        .with_nanosecond(0)?;
    let status: i32 = caps[5].parse().ok()?;
    if !(100..=599).contains(&status) {
        return None;
    }
    let body_bytes_sent: i32 = caps[6].parse().ok()?;

    Some(NewLog {
        remote_addr: caps[1].to_string(),
        remote_user: caps[2].to_string(),
        time_local,
        request: caps[4].to_string(),
        status,
        body_bytes_sent,
        http_referer: caps[7].to_string(),
        http_user_agent: caps[8].to_string(),
        http_x_forwarded_for: caps[9].to_string(),
    })
}
