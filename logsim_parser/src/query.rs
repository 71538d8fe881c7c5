//! Compiles filters into parameterized SQL.
//!
//! Every user-supplied value travels through a positional `$n` parameter;
//! nothing is ever interpolated into the statement text. For each shape the
//! returned parameter list length equals the number of placeholders emitted.

use crate::error::ParserError;
use crate::models::{LogFilter, NewLog, PageRequest, SqlParam};

pub const SELECT_COLUMNS: &str = "id, remote_addr, remote_user, time_local, request, status, \
     body_bytes_sent, http_referer, http_user_agent, http_x_forwarded_for";

const INSERT_COLUMNS: &str = "remote_addr, remote_user, time_local, request, status, \
     body_bytes_sent, http_referer, http_user_agent, http_x_forwarded_for";

/// Page select ordered by `(time_local, id)` descending with a keyset cursor.
pub fn compile_select(table: &str, filter: &LogFilter, page: &PageRequest) -> (String, Vec<SqlParam>) {
    let mut sql = format!("SELECT {} FROM {} WHERE 1=1", SELECT_COLUMNS, table);
    let mut params = Vec::new();
    push_predicates(&mut sql, &mut params, filter);

    if let Some(cursor) = &page.cursor {
        params.push(SqlParam::Timestamp(cursor.time_local));
        params.push(SqlParam::Int(i64::from(cursor.id)));
        sql.push_str(&format!(
            " AND (time_local, id) < (${}, ${})",
            params.len() - 1,
            params.len()
        ));
    }

    sql.push_str(" ORDER BY time_local DESC, id DESC");
    params.push(SqlParam::Int(page.limit));
    sql.push_str(&format!(" LIMIT ${}", params.len()));
    (sql, params)
}

/// Filtered count, no paging.
pub fn compile_count(table: &str, filter: &LogFilter) -> (String, Vec<SqlParam>) {
    let mut sql = format!("SELECT COUNT(*) FROM {} WHERE 1=1", table);
    let mut params = Vec::new();
    push_predicates(&mut sql, &mut params, filter);
    (sql, params)
}

/// Filtered delete. Refuses to compile without at least one predicate — an
/// unfiltered delete must never reach the store.
pub fn compile_delete(table: &str, filter: &LogFilter) -> Result<(String, Vec<SqlParam>), ParserError> {
    if filter.is_empty() {
        return Err(ParserError::DeleteRequiresFilter);
    }
    let mut sql = format!("DELETE FROM {} WHERE 1=1", table);
    let mut params = Vec::new();
    push_predicates(&mut sql, &mut params, filter);
    Ok((sql, params))
}

/// Multi-row insert with nine columns per row, placeholders `$1..$9N`.
pub fn compile_insert(table: &str, rows: &[NewLog]) -> (String, Vec<SqlParam>) {
    let mut sql = format!("INSERT INTO {} ({}) VALUES ", table, INSERT_COLUMNS);
    let mut params = Vec::with_capacity(rows.len() * 9);

    for (row_index, row) in rows.iter().enumerate() {
        if row_index > 0 {
            sql.push_str(", ");
        }
        let base = row_index * 9;
        sql.push_str(&format!(
            "(${}, ${}, ${}, ${}, ${}, ${}, ${}, ${}, ${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5,
            base + 6,
            base + 7,
            base + 8,
            base + 9
        ));
        params.push(SqlParam::Text(row.remote_addr.clone()));
        params.push(SqlParam::Text(row.remote_user.clone()));
        params.push(SqlParam::Timestamp(row.time_local));
        params.push(SqlParam::Text(row.request.clone()));
        params.push(SqlParam::Int(i64::from(row.status)));
        params.push(SqlParam::Int(i64::from(row.body_bytes_sent)));
        params.push(SqlParam::Text(row.http_referer.clone()));
        params.push(SqlParam::Text(row.http_user_agent.clone()));
        params.push(SqlParam::Text(row.http_x_forwarded_for.clone()));
    }
    (sql, params)
}

fn push_predicates(sql: &mut String, params: &mut Vec<SqlParam>, filter: &LogFilter) {
    for (column, value) in &filter.predicates {
        params.push(value.clone());
        sql.push_str(&format!(" AND {} = ${}", column.as_str(), params.len()));
    }
    if let Some(start) = filter.start_time {
        params.push(SqlParam::Timestamp(start));
        sql.push_str(&format!(" AND time_local >= ${}", params.len()));
    }
    if let Some(end) = filter.end_time {
        params.push(SqlParam::Timestamp(end));
        sql.push_str(&format!(" AND time_local <= ${}", params.len()));
    }
}
