//! Storage adapter: pool lifecycle, schema bootstrap, reads and batched writes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, error, info};

use crate::config::{LogsConfig, ParserConfig};
use crate::error::ParserError;
use crate::models::{LogFilter, LogRecord, NewLog, PageRequest, SqlParam};
use crate::query;

/// Rows per INSERT statement; a whole batch still commits in one transaction.
pub const INSERT_CHUNK_ROWS: usize = 1000;

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut bound = $query;
        for param in $params {
            bound = match param {
                SqlParam::Text(value) => bound.bind(value),
                SqlParam::Int(value) => bound.bind(value),
                SqlParam::Timestamp(value) => bound.bind(value),
            };
        }
        bound
    }};
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connects the pool and verifies reachability. A failure here is fatal
    /// for the process.
    pub async fn connect(config: &ParserConfig) -> Result<Self, ParserError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .connect(&config.database_url())
            .await
            .map_err(|e| {
                error!("failed to create database connection pool: {}", e);
                ParserError::StoreOperation(format!("Failed to connect to database: {}", e))
            })?;
        info!("database connection pool created");
        Ok(Self { pool })
    }

    /// Creates the pool without an eager connection; connections are only
    /// established on first use. Request-time pings surface unreachability.
    pub fn connect_lazy(config: &ParserConfig) -> Result<Self, ParserError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
            .connect_lazy(&config.database_url())
            .map_err(|e| ParserError::StoreOperation(format!("Invalid database URL: {}", e)))?;
        Ok(Self { pool })
    }

    /// Ensures the logs table and its time index exist. Both statements are
    /// idempotent.
    pub async fn ensure_schema(&self, logs: &LogsConfig) -> Result<(), ParserError> {
        sqlx::query(&logs.create_table_query)
            .execute(&self.pool)
            .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_time_local ON {} (time_local)",
            logs.table_name
        ))
        .execute(&self.pool)
        .await?;
        info!("table {} and idx_time_local are present", logs.table_name);
        Ok(())
    }

    /// Request-time reachability probe.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    pub async fn count_all(&self, table: &str) -> Result<i64, ParserError> {
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_filtered(&self, table: &str, filter: &LogFilter) -> Result<i64, ParserError> {
        let (sql, params) = query::compile_count(table, filter);
        let count = bind_params!(sqlx::query_scalar(&sql), params)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn fetch_page(
        &self,
        table: &str,
        filter: &LogFilter,
        page: &PageRequest,
    ) -> Result<Vec<LogRecord>, ParserError> {
        let (sql, params) = query::compile_select(table, filter, page);
        let records = bind_params!(sqlx::query_as::<_, LogRecord>(&sql), params)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    pub async fn delete(&self, table: &str, filter: &LogFilter) -> Result<u64, ParserError> {
        let (sql, params) = query::compile_delete(table, filter)?;
        let result = bind_params!(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Inserts a parsed batch in one transaction. Any statement failure rolls
    /// the whole batch back — there are no partial commits.
    pub async fn insert_batch(&self, table: &str, rows: &[NewLog]) -> Result<u64, ParserError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
            let (sql, params) = query::compile_insert(table, chunk);
            let result = bind_params!(sqlx::query(&sql), params)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        debug!("inserted {} rows in batch", inserted);
        Ok(inserted)
    }

    /// Newest rows from the trailing window, capped, for the analytics engine.
    pub async fn fetch_recent(
        &self,
        table: &str,
        hours: i64,
        limit: i64,
    ) -> Result<Vec<LogRecord>, ParserError> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours);
        let sql = format!(
            "SELECT {} FROM {} WHERE time_local >= $1 ORDER BY time_local DESC LIMIT $2",
            query::SELECT_COLUMNS,
            table
        );
        let records = sqlx::query_as::<_, LogRecord>(&sql)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    // Aggregates for the stats endpoints.

    pub async fn status_counts(&self, table: &str) -> Result<Vec<(i32, i64)>, ParserError> {
        let rows = sqlx::query(&format!(
            "SELECT status, COUNT(*) AS count FROM {} GROUP BY status ORDER BY count DESC",
            table
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("status"), row.get("count")))
            .collect())
    }

    pub async fn top_ips(&self, table: &str, limit: i64) -> Result<Vec<(String, i64)>, ParserError> {
        let rows = sqlx::query(&format!(
            "SELECT remote_addr, COUNT(*) AS count FROM {} GROUP BY remote_addr ORDER BY count DESC LIMIT $1",
            table
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("remote_addr"), row.get("count")))
            .collect())
    }

    pub async fn hourly_counts(
        &self,
        table: &str,
        hours: i64,
    ) -> Result<Vec<(DateTime<Utc>, i64)>, ParserError> {
        let cutoff = Utc::now() - chrono::Duration::hours(hours);
        let rows = sqlx::query(&format!(
            "SELECT date_trunc('hour', time_local) AS hour, COUNT(*) AS count \
             FROM {} WHERE time_local >= $1 GROUP BY hour ORDER BY hour",
            table
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("hour"), row.get("count")))
            .collect())
    }

    pub async fn error_count(&self, table: &str) -> Result<i64, ParserError> {
        let count = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE status >= 400",
            table
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn unique_ip_count(&self, table: &str) -> Result<i64, ParserError> {
        let count = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT remote_addr) FROM {}",
            table
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn avg_body_bytes(&self, table: &str) -> Result<f64, ParserError> {
        let avg = sqlx::query_scalar(&format!(
            "SELECT COALESCE(AVG(body_bytes_sent), 0)::float8 FROM {}",
            table
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(avg)
    }
}
