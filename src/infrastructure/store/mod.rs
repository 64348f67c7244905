//! SQLite-backed query sessions over converted artifacts.
//!
//! `load` ingests a DJSON file (one JSON object per line) into an in-memory
//! table and returns an explicit session handle; every query goes through
//! that handle. There is no implicit "current table" shared across calls.

use crate::domain::error::{BridgeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row, TypeInfo, ValueRef as _};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tokio::io::AsyncBufReadExt;

/// Table a converted artifact is loaded into.
const DATA_TABLE: &str = "data";
/// Row cap applied by `query` when the statement carries no LIMIT of its own.
const DEFAULT_QUERY_LIMIT: u32 = 100;
/// Value cap applied by `distinct_values` when none is given.
const DEFAULT_DISTINCT_LIMIT: u32 = 1000;
/// Rows buffered while inferring column types during load.
const SCHEMA_SAMPLE_ROWS: usize = 512;

// Word-boundary match so identifiers like `limit_note` don't count as a
// LIMIT clause.
static LIMIT_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blimit\b").unwrap());

// The driver runs every semicolon-separated statement in the string, and
// SQLite accepts CTE-prefixed writes, so the SELECT/WITH prefix alone is no
// guard. Word boundaries keep column names like `created_at` out of it.
static WRITE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|drop|alter|create|truncate|into|vacuum|pragma|attach|detach)\b")
        .unwrap()
});

#[derive(Debug, Clone, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<HashMap<String, serde_json::Value>>,
    pub row_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl InferredType {
    fn sql_name(self) -> &'static str {
        match self {
            InferredType::Integer => "INTEGER",
            InferredType::Real => "REAL",
            InferredType::Boolean => "BOOLEAN",
            InferredType::Text => "TEXT",
        }
    }
}

/// One loaded artifact, queryable until closed or dropped.
#[derive(Debug)]
pub struct DataSession {
    pool: SqlitePool,
    columns: Vec<ColumnMeta>,
}

impl DataSession {
    /// Load a DJSON artifact into a fresh in-memory table.
    ///
    /// Column set and order come from the first record; types from the first
    /// non-null value per column, with rows buffered until every column
    /// resolves or the sample cap is reached (unresolved columns fall back to
    /// TEXT). Malformed lines are skipped with a diagnostic; an artifact with
    /// no decodable rows is an error.
    pub async fn load(path: &Path) -> Result<DataSession> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            BridgeError::NotFound(format!("cannot open artifact {}: {}", path.display(), e))
        })?;
        let mut lines = tokio::io::BufReader::new(file).lines();

        let mut names: Vec<String> = Vec::new();
        let mut types: Vec<Option<InferredType>> = Vec::new();
        let mut sample: Vec<serde_json::Map<String, serde_json::Value>> = Vec::new();
        let mut skipped = 0usize;

        while let Some(line) = next_artifact_line(&mut lines).await? {
            let Some(record) = decode_record(&line, &mut skipped) else {
                continue;
            };
            if names.is_empty() {
                names = record.keys().cloned().collect();
                types = vec![None; names.len()];
            }
            for (i, name) in names.iter().enumerate() {
                if types[i].is_none() {
                    types[i] = record.get(name).and_then(infer_type);
                }
            }
            sample.push(record);
            if types.iter().all(|t| t.is_some()) || sample.len() >= SCHEMA_SAMPLE_ROWS {
                break;
            }
        }

        if sample.is_empty() {
            return Err(BridgeError::DatabaseError(format!(
                "artifact {} contains no decodable rows ({} lines skipped)",
                path.display(),
                skipped
            )));
        }

        let columns: Vec<ColumnMeta> = names
            .iter()
            .zip(&types)
            .map(|(name, ty)| ColumnMeta {
                name: name.clone(),
                data_type: ty.unwrap_or(InferredType::Text).sql_name().to_string(),
            })
            .collect();

        let pool = open_memory_pool().await?;
        let ddl = format!(
            "CREATE TABLE {} ({})",
            DATA_TABLE,
            columns
                .iter()
                .map(|c| format!("{} {}", quote_ident(&c.name), c.data_type))
                .collect::<Vec<_>>()
                .join(", ")
        );
        sqlx::query(&ddl)
            .execute(&pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("failed to create table: {}", e)))?;

        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            DATA_TABLE,
            columns
                .iter()
                .map(|c| quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; columns.len()].join(", ")
        );

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("failed to begin load: {}", e)))?;
        let mut inserted = 0u64;
        for record in &sample {
            insert_record(&mut tx, &insert_sql, &names, record).await?;
            inserted += 1;
        }
        while let Some(line) = next_artifact_line(&mut lines).await? {
            let Some(record) = decode_record(&line, &mut skipped) else {
                continue;
            };
            insert_record(&mut tx, &insert_sql, &names, &record).await?;
            inserted += 1;
        }
        tx.commit()
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("failed to commit load: {}", e)))?;

        tracing::info!(
            "Loaded {} rows from {} ({} lines skipped)",
            inserted,
            path.display(),
            skipped
        );

        Ok(DataSession { pool, columns })
    }

    /// Execute a read query. The statement must start with SELECT or WITH
    /// and carry no write keyword anywhere; a LIMIT clause is appended when
    /// the statement has none, capping result rows at `limit` (default 100).
    pub async fn query(&self, sql: &str, limit: Option<u32>) -> Result<QueryResult> {
        let trimmed = sql.trim();
        let upper = trimmed.to_uppercase();
        if !upper.starts_with("SELECT") && !upper.starts_with("WITH") {
            return Err(BridgeError::InvalidQuery(
                "only SELECT queries are allowed".to_string(),
            ));
        }
        if WRITE_KEYWORD.is_match(trimmed) {
            return Err(BridgeError::InvalidQuery(
                "write statements are not allowed".to_string(),
            ));
        }

        let bounded = if LIMIT_CLAUSE.is_match(trimmed) {
            trimmed.to_string()
        } else {
            format!(
                "{} LIMIT {}",
                trimmed.trim_end_matches(';').trim_end(),
                limit.unwrap_or(DEFAULT_QUERY_LIMIT)
            )
        };
        tracing::debug!("Executing session query: {}", bounded);

        let result = sqlx::query(&bounded)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::InvalidQuery(format!("query failed: {}", e)))?;

        let mut rows_json: Vec<HashMap<String, serde_json::Value>> = Vec::new();
        let mut columns: Vec<String> = Vec::new();
        for row in &result {
            if columns.is_empty() {
                columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            let mut row_map = HashMap::new();
            for (i, column) in row.columns().iter().enumerate() {
                row_map.insert(column.name().to_string(), extract_column_value(row, i));
            }
            rows_json.push(row_map);
        }

        Ok(QueryResult {
            columns,
            row_count: rows_json.len(),
            rows: rows_json,
        })
    }

    /// Ordered column metadata captured at load.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub async fn row_count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", DATA_TABLE);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("row count failed: {}", e)))?;
        Ok(count as u64)
    }

    /// Distinct non-null values of one column, ascending, capped at `limit`
    /// (default 1000).
    pub async fn distinct_values(
        &self,
        column: &str,
        limit: Option<u32>,
    ) -> Result<Vec<serde_json::Value>> {
        if !self.columns.iter().any(|c| c.name == column) {
            return Err(BridgeError::NotFound(format!("no such column: {}", column)));
        }
        let ident = quote_ident(column);
        let sql = format!(
            "SELECT DISTINCT {ident} FROM {DATA_TABLE} WHERE {ident} IS NOT NULL ORDER BY {ident} LIMIT {}",
            limit.unwrap_or(DEFAULT_DISTINCT_LIMIT)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| BridgeError::DatabaseError(format!("distinct query failed: {}", e)))?;
        Ok(rows.iter().map(|row| extract_column_value(row, 0)).collect())
    }

    /// `COUNT(*)` under an optional caller-supplied predicate (a `WHERE`
    /// body expressed as a SQL fragment). The predicate passes the same
    /// write-keyword check as `query`.
    pub async fn filtered_count(&self, predicate: Option<&str>) -> Result<u64> {
        let sql = match predicate.map(str::trim).filter(|p| !p.is_empty()) {
            Some(pred) => {
                if WRITE_KEYWORD.is_match(pred) {
                    return Err(BridgeError::InvalidQuery(
                        "write statements are not allowed in a predicate".to_string(),
                    ));
                }
                format!("SELECT COUNT(*) FROM {} WHERE {}", DATA_TABLE, pred)
            }
            None => format!("SELECT COUNT(*) FROM {}", DATA_TABLE),
        };
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| BridgeError::InvalidQuery(format!("filtered count failed: {}", e)))?;
        Ok(count as u64)
    }

    /// Tear down the underlying pool. Dropping the session without calling
    /// this is safe; the in-memory database goes away with the pool.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn next_artifact_line(
    lines: &mut tokio::io::Lines<tokio::io::BufReader<tokio::fs::File>>,
) -> Result<Option<String>> {
    loop {
        match lines
            .next_line()
            .await
            .map_err(|e| BridgeError::IoError(format!("failed to read artifact: {}", e)))?
        {
            Some(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                return Ok(Some(line));
            }
            None => return Ok(None),
        }
    }
}

fn decode_record(
    line: &str,
    skipped: &mut usize,
) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(_) => {
            *skipped += 1;
            tracing::warn!("Skipping non-object artifact line");
            None
        }
        Err(e) => {
            *skipped += 1;
            tracing::warn!("Skipping malformed artifact line: {}", e);
            None
        }
    }
}

fn infer_type(value: &serde_json::Value) -> Option<InferredType> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(_) => Some(InferredType::Boolean),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(InferredType::Integer),
        serde_json::Value::Number(_) => Some(InferredType::Real),
        _ => Some(InferredType::Text),
    }
}

async fn open_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| BridgeError::DatabaseError(format!("failed to parse sqlite options: {}", e)))?;

    // One connection, never reclaimed: the in-memory database lives in that
    // connection, and a pool recycle would silently start over empty.
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("failed to open session store: {}", e)))
}

async fn insert_record(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    sql: &str,
    names: &[String],
    record: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
    let mut query = sqlx::query(sql);
    for name in names {
        query = match record.get(name) {
            Some(serde_json::Value::Bool(b)) => query.bind(*b),
            Some(serde_json::Value::Number(n)) if n.is_i64() => query.bind(n.as_i64()),
            Some(serde_json::Value::Number(n)) => query.bind(n.as_f64()),
            Some(serde_json::Value::String(s)) => query.bind(s.clone()),
            Some(serde_json::Value::Null) | None => query.bind(Option::<String>::None),
            Some(other) => query.bind(other.to_string()),
        };
    }
    query
        .execute(&mut **tx)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("failed to insert row: {}", e)))?;
    Ok(())
}

/// Map a column value to JSON by declared type. Expression columns such as
/// `COUNT(*)` carry no declared type, so those fall back to the value's
/// runtime type.
fn extract_column_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    let mut type_name = row.column(index).type_info().name().to_uppercase();
    if type_name == "NULL" {
        if let Ok(value) = row.try_get_raw(index) {
            type_name = value.type_info().name().to_uppercase();
        }
    }
    match type_name.as_str() {
        "INTEGER" => int_value(row, index),
        "REAL" => float_value(row, index),
        "BOOLEAN" => bool_value(row, index),
        "TEXT" => text_value(row, index),
        _ => serde_json::Value::Null,
    }
}

fn int_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    row.try_get::<Option<i64>, _>(index)
        .ok()
        .flatten()
        .map(|n| serde_json::Value::Number(n.into()))
        .unwrap_or(serde_json::Value::Null)
}

fn float_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    row.try_get::<Option<f64>, _>(index)
        .ok()
        .flatten()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn bool_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    row.try_get::<Option<bool>, _>(index)
        .ok()
        .flatten()
        .map(serde_json::Value::Bool)
        .unwrap_or(serde_json::Value::Null)
}

fn text_value(row: &SqliteRow, index: usize) -> serde_json::Value {
    row.try_get::<Option<String>, _>(index)
        .ok()
        .flatten()
        .map(serde_json::Value::String)
        .unwrap_or(serde_json::Value::Null)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
