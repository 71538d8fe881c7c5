//! Compiler invariants across filter combinations.

use chrono::{TimeZone, Utc};
use regex::Regex;

use logsim_parser::error::ParserError;
use logsim_parser::models::{Cursor, FilterColumn, LogFilter, NewLog, PageRequest, SqlParam};
use logsim_parser::query;

fn placeholders(sql: &str) -> Vec<usize> {
    Regex::new(r"\$(\d+)")
        .unwrap()
        .captures_iter(sql)
        .map(|c| c[1].parse().unwrap())
        .collect()
}

/// Every subset of predicate columns, with and without date bounds and
/// cursor: parameter count always equals placeholder count, and placeholders
/// are numbered 1..=n without gaps.
#[test]
fn placeholder_parameter_parity_over_filter_space() {
    let t0 = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
    let t1 = Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap();

    for mask in 0u32..64 {
        for with_dates in [false, true] {
            for with_cursor in [false, true] {
                let mut filter = LogFilter::default();
                for (bit, column) in FilterColumn::ALL.iter().enumerate() {
                    if mask & (1 << bit) != 0 {
                        let value = match column {
                            FilterColumn::Status => SqlParam::Int(404),
                            FilterColumn::BodyBytesSent => SqlParam::Int(512),
                            _ => SqlParam::Text(format!("value-{}", bit)),
                        };
                        filter.predicates.push((*column, value));
                    }
                }
                if with_dates {
                    filter.start_time = Some(t0);
                    filter.end_time = Some(t1);
                }
                let page = PageRequest {
                    limit: 10,
                    cursor: with_cursor.then_some(Cursor {
                        time_local: t1,
                        id: 7,
                    }),
                };

                let (sql, params) = query::compile_select("logs", &filter, &page);
                let markers = placeholders(&sql);
                assert_eq!(markers.len(), params.len(), "select: {}", sql);
                assert_eq!(
                    markers,
                    (1..=params.len()).collect::<Vec<_>>(),
                    "select placeholders must be dense: {}",
                    sql
                );

                let (sql, params) = query::compile_count("logs", &filter);
                assert_eq!(placeholders(&sql).len(), params.len(), "count: {}", sql);

                match query::compile_delete("logs", &filter) {
                    Ok((sql, params)) => {
                        assert!(!filter.is_empty());
                        assert_eq!(placeholders(&sql).len(), params.len(), "delete: {}", sql);
                    }
                    Err(ParserError::DeleteRequiresFilter) => assert!(filter.is_empty()),
                    Err(e) => panic!("unexpected delete error: {}", e),
                }
            }
        }
    }
}

#[test]
fn insert_placeholders_are_dense_for_any_batch_size() {
    let row = NewLog {
        remote_addr: "10.0.0.1".into(),
        remote_user: "-".into(),
        time_local: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap(),
        request: "GET / HTTP/1.1".into(),
        status: 200,
        body_bytes_sent: 512,
        http_referer: "-".into(),
        http_user_agent: "UA".into(),
        http_x_forwarded_for: "1.1.1.1".into(),
    };
    for batch_size in [1usize, 2, 7, 100] {
        let rows = vec![row.clone(); batch_size];
        let (sql, params) = query::compile_insert("logs", &rows);
        let markers = placeholders(&sql);
        assert_eq!(markers.len(), batch_size * 9);
        assert_eq!(params.len(), batch_size * 9);
        assert_eq!(markers, (1..=batch_size * 9).collect::<Vec<_>>());
    }
}

/// The select shape keeps user values out of the SQL text entirely.
#[test]
fn filter_values_never_appear_in_sql() {
    let hostile = "'; DROP TABLE logs; --";
    let filter = LogFilter {
        predicates: vec![(
            FilterColumn::RemoteAddr,
            SqlParam::Text(hostile.to_string()),
        )],
        ..LogFilter::default()
    };
    let (sql, params) = query::compile_select("logs", &filter, &PageRequest::default());
    assert!(!sql.contains(hostile));
    assert_eq!(params[0], SqlParam::Text(hostile.to_string()));
}
