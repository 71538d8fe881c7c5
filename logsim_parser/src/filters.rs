//! Extraction of filters, date ranges and pagination from query parameters.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::error::ParserError;
use crate::models::{Cursor, FilterColumn, LogFilter, PageRequest, SqlParam, MAX_PAGE_LIMIT};

/// Builds a [`LogFilter`] from the request's query parameters. Unknown keys
/// are ignored; invalid dates are rejected.
pub fn filter_from_params(params: &HashMap<String, String>) -> Result<LogFilter, ParserError> {
    let mut filter = LogFilter::default();

    for column in FilterColumn::ALL {
        let Some(raw) = non_empty(params, column.as_str()) else {
            continue;
        };
        match column {
            FilterColumn::Status | FilterColumn::BodyBytesSent => {
                // a non-numeric value for a numeric column is treated like an
                // unknown key
                if let Ok(value) = raw.parse::<i64>() {
                    filter.predicates.push((column, SqlParam::Int(value)));
                }
            }
            _ => filter
                .predicates
                .push((column, SqlParam::Text(raw.to_string()))),
        }
    }

    if let Some(raw) = non_empty(params, "start_time") {
        filter.start_time = Some(parse_date_or_datetime(raw)?);
    }
    if let Some(raw) = non_empty(params, "end_time") {
        filter.end_time = Some(parse_date_or_datetime(raw)?);
    }
    if let (Some(start), Some(end)) = (filter.start_time, filter.end_time) {
        if start > end {
            filter.start_time = Some(end);
            filter.end_time = Some(start);
        }
    }

    Ok(filter)
}

/// Builds a [`PageRequest`] from the query parameters. An out-of-range limit
/// falls back to the default; a half-formed cursor is rejected.
pub fn page_from_params(params: &HashMap<String, String>) -> Result<PageRequest, ParserError> {
    let mut page = PageRequest::default();

    if let Some(raw) = non_empty(params, "limit") {
        match raw.parse::<i64>() {
            Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => page.limit = limit,
            _ => info!(
                "invalid or out-of-range 'limit' parameter: {:?}, defaulting to {}",
                raw, page.limit
            ),
        }
    }

    if let Some(raw) = non_empty(params, "cursor") {
        page.cursor = Some(parse_cursor(raw, params.get("id").map(String::as_str))?);
    }

    Ok(page)
}

/// Parses a cursor token. The `<RFC3339>&id=<int>` form arrives either as a
/// single encoded value or split into `cursor` and `id` parameters when the
/// client left the `&` unescaped. Both halves must be present.
pub fn parse_cursor(raw: &str, id_param: Option<&str>) -> Result<Cursor, ParserError> {
    let (time_part, id_part) = match raw.split_once("&id=") {
        Some((time_part, id_part)) => (time_part, Some(id_part)),
        None => (raw, id_param),
    };
    let id_part = id_part.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        ParserError::InvalidInput(format!(
            "Invalid 'cursor' parameter: '{}'. Expected '<RFC3339>&id=<int>'",
            raw
        ))
    })?;

    let time_local = parse_date_or_datetime(time_part).map_err(|_| {
        ParserError::InvalidInput(format!(
            "Invalid 'cursor' parameter: '{}'. Expected '<RFC3339>&id=<int>'",
            raw
        ))
    })?;
    let id = id_part.parse::<i32>().map_err(|_| {
        ParserError::InvalidInput(format!(
            "Invalid 'cursor' parameter: '{}'. Expected '<RFC3339>&id=<int>'",
            raw
        ))
    })?;

    Ok(Cursor { time_local, id })
}

/// Accepts a full RFC3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date_or_datetime(input: &str) -> Result<DateTime<Utc>, ParserError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(ParserError::InvalidInput(format!(
        "invalid date format: '{}'. Expected formats: RFC3339 (e.g., 2025-04-08T06:57:05Z) or date (e.g., 2025-04-08)",
        input
    )))
}

fn non_empty<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn known_keys_become_predicates_unknown_are_ignored() {
        let filter = filter_from_params(&params(&[
            ("remote_addr", "10.0.0.1"),
            ("status", "404"),
            ("nonsense_key", "whatever"),
            ("http_user_agent", "UA"),
        ]))
        .unwrap();
        assert_eq!(filter.predicates.len(), 3);
        assert_eq!(filter.predicates[0].0, FilterColumn::RemoteAddr);
        assert_eq!(filter.predicates[1].1, SqlParam::Int(404));
    }

    #[test]
    fn non_numeric_status_is_ignored() {
        let filter = filter_from_params(&params(&[("status", "abc")])).unwrap();
        assert!(filter.predicates.is_empty());
    }

    #[test]
    fn dates_accept_both_formats() {
        let filter = filter_from_params(&params(&[
            ("start_time", "2025-04-08"),
            ("end_time", "2025-04-09T06:57:05Z"),
        ]))
        .unwrap();
        assert_eq!(
            filter.start_time.unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 8, 0, 0, 0).unwrap()
        );
        assert_eq!(
            filter.end_time.unwrap(),
            Utc.with_ymd_and_hms(2025, 4, 9, 6, 57, 5).unwrap()
        );
    }

    #[test]
    fn inverted_range_swaps_silently() {
        let filter = filter_from_params(&params(&[
            ("start_time", "2025-04-09"),
            ("end_time", "2025-04-08"),
        ]))
        .unwrap();
        assert!(filter.start_time.unwrap() < filter.end_time.unwrap());
    }

    #[test]
    fn invalid_date_is_rejected() {
        let result = filter_from_params(&params(&[("start_time", "04/08/2025")]));
        assert!(matches!(result, Err(ParserError::InvalidInput(_))));
    }

    #[test]
    fn limit_out_of_range_falls_back_to_default() {
        for bad in ["0", "101", "-3", "abc"] {
            let page = page_from_params(&params(&[("limit", bad)])).unwrap();
            assert_eq!(page.limit, 10, "limit {:?}", bad);
        }
        let page = page_from_params(&params(&[("limit", "100")])).unwrap();
        assert_eq!(page.limit, 100);
    }

    #[test]
    fn cursor_parses_combined_token() {
        let page = page_from_params(&params(&[("cursor", "2025-04-10T10:20:30Z&id=42")])).unwrap();
        let cursor = page.cursor.unwrap();
        assert_eq!(cursor.id, 42);
        assert_eq!(
            cursor.time_local,
            Utc.with_ymd_and_hms(2025, 4, 10, 10, 20, 30).unwrap()
        );
    }

    #[test]
    fn cursor_parses_split_parameters() {
        let page = page_from_params(&params(&[
            ("cursor", "2025-04-10T10:20:30Z"),
            ("id", "42"),
        ]))
        .unwrap();
        assert_eq!(page.cursor.unwrap().id, 42);
    }

    #[test]
    fn half_a_cursor_is_rejected() {
        assert!(page_from_params(&params(&[("cursor", "2025-04-10T10:20:30Z")])).is_err());
        assert!(page_from_params(&params(&[("cursor", "junk&id=42")])).is_err());
        assert!(page_from_params(&params(&[("cursor", "2025-04-10T10:20:30Z&id=x")])).is_err());
    }

    #[test]
    fn token_round_trips_through_parser() {
        let cursor = Cursor {
            time_local: Utc.with_ymd_and_hms(2025, 4, 10, 10, 20, 30).unwrap(),
            id: 7,
        };
        let parsed = parse_cursor(&cursor.token(), None).unwrap();
        assert_eq!(parsed, cursor);
    }
}
