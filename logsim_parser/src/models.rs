//! Core data types: parsed lines, stored rows, filters and pagination.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A parsed access-log line, ready for insertion. Ids are assigned by the
/// store at insert time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewLog {
    pub remote_addr: String,
    pub remote_user: String,
    pub time_local: DateTime<Utc>,
    pub request: String,
    pub status: i32,
    pub body_bytes_sent: i32,
    pub http_referer: String,
    pub http_user_agent: String,
    pub http_x_forwarded_for: String,
}

/// A stored log row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LogRecord {
    pub id: i32,
    pub remote_addr: String,
    pub remote_user: String,
    pub time_local: DateTime<Utc>,
    pub request: String,
    pub status: i32,
    pub body_bytes_sent: i32,
    pub http_referer: String,
    pub http_user_agent: String,
    pub http_x_forwarded_for: String,
}

impl LogRecord {
    pub fn cursor(&self) -> Cursor {
        Cursor {
            time_local: self.time_local,
            id: self.id,
        }
    }
}

/// Columns that accept exact-match filters. The set is closed; anything else
/// in a query string is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterColumn {
    RemoteAddr,
    Status,
    BodyBytesSent,
    HttpReferer,
    HttpUserAgent,
    HttpXForwardedFor,
}

impl FilterColumn {
    /// Deterministic compile order for predicates.
    pub const ALL: [FilterColumn; 6] = [
        FilterColumn::RemoteAddr,
        FilterColumn::Status,
        FilterColumn::BodyBytesSent,
        FilterColumn::HttpReferer,
        FilterColumn::HttpUserAgent,
        FilterColumn::HttpXForwardedFor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterColumn::RemoteAddr => "remote_addr",
            FilterColumn::Status => "status",
            FilterColumn::BodyBytesSent => "body_bytes_sent",
            FilterColumn::HttpReferer => "http_referer",
            FilterColumn::HttpUserAgent => "http_user_agent",
            FilterColumn::HttpXForwardedFor => "http_x_forwarded_for",
        }
    }
}

/// A typed value bound into a compiled statement. User input never reaches
/// the SQL text; it always travels through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

/// Exact-match predicates plus an optional time range.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub predicates: Vec<(FilterColumn, SqlParam)>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl LogFilter {
    /// True when the filter constrains nothing at all.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.start_time.is_none() && self.end_time.is_none()
    }
}

/// Keyset-pagination cursor; the composite keeps second-precision timestamp
/// ties unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub time_local: DateTime<Utc>,
    pub id: i32,
}

impl Cursor {
    /// Wire token: `<RFC3339>&id=<int>`.
    pub fn token(&self) -> String {
        format!(
            "{}&id={}",
            self.time_local.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.id
        )
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub limit: i64,
    pub cursor: Option<Cursor>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            cursor: None,
        }
    }
}
