//! PostgreSQL connector for the chat pipeline.
//!
//! Opens a single-connection pool from the sidebar form values, renders the
//! `public` schema as `CREATE TABLE` text with a few sample rows, and runs
//! model-generated SQL exactly as received.
//!
//! Generated SQL goes through the simple query protocol, so a string may hold
//! several statements. Each call runs in its own transaction that is committed
//! on success and rolled back on error; a stray `BEGIN` cannot leave the
//! connection inside an aborted transaction.
//!
//! Generated SQL is not inspected: there is no statement allow-list, no query
//! timeout and no row cap. Point the form at a read-only role if that matters.

use super::{DatabaseConnector, DbConnectionConfig, SharedDatabase, SqlDatabase};
use crate::domain::connection::ConnectionConfig;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgValueRef};
use sqlx::{Column, Row, ValueRef};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const COLUMNS_QUERY: &str = r#"
    SELECT
        c.relname::text AS table_name,
        a.attname::text AS column_name,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        NOT a.attnotnull AS is_nullable
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = 'public'
        AND c.relkind IN ('r', 'p')
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY c.relname, a.attnum
"#;

pub struct PostgresConnector {
    config: DbConnectionConfig,
}

impl PostgresConnector {
    pub fn new(config: DbConnectionConfig) -> Self {
        Self { config }
    }

    fn build_pg_options(conn: &ConnectionConfig) -> Result<PgConnectOptions> {
        let port: u16 = conn.port.trim().parse().map_err(|_| {
            AppError::ConnectionError(format!("Invalid port '{}'", conn.port))
        })?;

        Ok(PgConnectOptions::new()
            .host(conn.host.trim())
            .port(port)
            .username(&conn.user)
            .password(&conn.password)
            .database(&conn.database))
    }
}

impl Default for PostgresConnector {
    fn default() -> Self {
        Self::new(DbConnectionConfig::default())
    }
}

#[async_trait]
impl DatabaseConnector for PostgresConnector {
    async fn connect(&self, conn: &ConnectionConfig) -> Result<SharedDatabase> {
        let options = Self::build_pg_options(conn)?;
        let timeout = Duration::from_secs(self.config.connect_timeout_secs);

        let pool = tokio::time::timeout(
            timeout,
            PgPoolOptions::new()
                .max_connections(1)
                .acquire_timeout(timeout)
                .connect_with(options),
        )
        .await
        .map_err(|_| {
            AppError::ConnectionError(format!(
                "Connection to {} timed out after {} seconds",
                conn.display_target(),
                self.config.connect_timeout_secs
            ))
        })?
        .map_err(|e| {
            error!(target_db = %conn.display_target(), error = %e, "Failed to connect to PostgreSQL");
            AppError::ConnectionError(format!(
                "Failed to connect to {}: {}",
                conn.display_target(),
                e
            ))
        })?;

        sqlx::query("SELECT 1 AS health_check")
            .fetch_one(&pool)
            .await
            .map_err(|e| {
                AppError::ConnectionError(format!("Connected but health check failed: {}", e))
            })?;

        info!(target_db = %conn.display_target(), user = %conn.user, "Connected to PostgreSQL");

        Ok(Arc::new(PostgresDatabase::new(pool, &self.config)))
    }
}

pub struct PostgresDatabase {
    pool: PgPool,
    sample_rows: usize,
    max_string_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct ColumnSchema {
    name: String,
    data_type: String,
    is_nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct TableSchema {
    name: String,
    columns: Vec<ColumnSchema>,
}

/// A single cell as returned in the text result format.
#[derive(Debug, Clone, PartialEq)]
enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(String),
    Text(String),
}

impl PostgresDatabase {
    pub fn new(pool: PgPool, config: &DbConnectionConfig) -> Self {
        Self {
            pool,
            sample_rows: config.sample_rows_in_table_info,
            max_string_length: config.max_string_length,
        }
    }

    async fn fetch_tables(&self) -> Result<Vec<TableSchema>> {
        let rows = sqlx::query(COLUMNS_QUERY)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::ExecutionError(format!("Failed to describe schema: {}", e)))?;

        let mut tables: Vec<TableSchema> = Vec::new();
        for row in rows {
            let table_name: String = row.try_get("table_name").map_err(|e| {
                AppError::ExecutionError(format!("Failed to parse table_name: {}", e))
            })?;
            let column = ColumnSchema {
                name: row.try_get("column_name").map_err(|e| {
                    AppError::ExecutionError(format!("Failed to parse column_name: {}", e))
                })?,
                data_type: row.try_get("data_type").map_err(|e| {
                    AppError::ExecutionError(format!("Failed to parse data_type: {}", e))
                })?,
                is_nullable: row.try_get("is_nullable").unwrap_or(true),
            };

            match tables.last_mut() {
                Some(table) if table.name == table_name => table.columns.push(column),
                _ => tables.push(TableSchema {
                    name: table_name,
                    columns: vec![column],
                }),
            }
        }

        Ok(tables)
    }

    async fn fetch_sample_rows(&self, table: &TableSchema) -> Result<Vec<Vec<SqlValue>>> {
        let sql = format!(
            "SELECT * FROM {} LIMIT {}",
            quote_ident(&table.name),
            self.sample_rows
        );
        let rows = sqlx::raw_sql(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::ExecutionError(e.to_string()))?;

        Ok(rows.iter().map(extract_row).collect())
    }
}

#[async_trait]
impl SqlDatabase for PostgresDatabase {
    async fn table_info(&self) -> Result<String> {
        let tables = self.fetch_tables().await?;

        let mut blocks = Vec::with_capacity(tables.len());
        for table in &tables {
            let mut block = render_create_table(table);
            if self.sample_rows > 0 {
                match self.fetch_sample_rows(table).await {
                    Ok(rows) => {
                        block.push_str("\n\n");
                        block.push_str(&render_sample_rows(table, &rows, self.max_string_length));
                    }
                    Err(e) => warn!(table = %table.name, error = %e, "Skipping sample rows"),
                }
            }
            blocks.push(block);
        }

        info!(tables = tables.len(), "Described database schema");
        Ok(blocks.join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<String> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::ExecutionError(e.to_string()))?;

        let rows = match sqlx::Executor::fetch_all(&mut *tx, sqlx::raw_sql(sql)).await {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed SQL did not complete");
                }
                return Err(AppError::ExecutionError(e.to_string()));
            }
        };

        tx.commit()
            .await
            .map_err(|e| AppError::ExecutionError(e.to_string()))?;

        info!(rows = rows.len(), "Executed generated SQL");

        let values: Vec<Vec<SqlValue>> = rows.iter().map(extract_row).collect();
        Ok(render_rows(&values, self.max_string_length))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn extract_row(row: &PgRow) -> Vec<SqlValue> {
    (0..row.columns().len())
        .map(|index| extract_column_value(row, index))
        .collect()
}

// Built-in type oids from pg_type.
const BOOL_OID: u32 = 16;
const INT8_OID: u32 = 20;
const INT2_OID: u32 = 21;
const INT4_OID: u32 = 23;
const OID_OID: u32 = 26;
const FLOAT4_OID: u32 = 700;
const FLOAT8_OID: u32 = 701;
const NUMERIC_OID: u32 = 1700;

/// Reads the cell's text form and types it by the column's type oid.
/// Types without a dedicated variant (enums, uuid, arrays, intervals...) keep their text.
fn extract_column_value(row: &PgRow, index: usize) -> SqlValue {
    let type_oid = row.columns()[index].type_info().oid().map(|oid| oid.0);

    let raw: PgValueRef<'_> = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(_) => return SqlValue::Text("<unreadable>".to_string()),
    };
    if raw.is_null() {
        return SqlValue::Null;
    }

    match raw.as_str() {
        Ok(text) => classify_text(type_oid, text),
        Err(_) => SqlValue::Text("<binary>".to_string()),
    }
}

fn classify_text(type_oid: Option<u32>, text: &str) -> SqlValue {
    match type_oid {
        Some(BOOL_OID) => match text {
            "t" => SqlValue::Bool(true),
            "f" => SqlValue::Bool(false),
            other => SqlValue::Text(other.to_string()),
        },
        Some(INT2_OID | INT4_OID | INT8_OID | OID_OID) => text
            .parse()
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(text.to_string())),
        Some(FLOAT4_OID | FLOAT8_OID) => text
            .parse()
            .map(SqlValue::Float)
            .unwrap_or_else(|_| SqlValue::Text(text.to_string())),
        Some(NUMERIC_OID) => SqlValue::Numeric(text.to_string()),
        _ => SqlValue::Text(text.to_string()),
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

/// Quotes a string the way a Python `repr` does: single quotes unless the
/// text contains a single quote and no double quote.
fn quote_literal(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl SqlValue {
    /// Literal form used in query results, e.g. `'asn'`, `12`, `None`.
    fn repr(&self, max_len: usize) -> String {
        match self {
            SqlValue::Null => "None".to_string(),
            SqlValue::Bool(true) => "True".to_string(),
            SqlValue::Bool(false) => "False".to_string(),
            SqlValue::Int(n) => n.to_string(),
            SqlValue::Float(n) if n.is_finite() && n.fract() == 0.0 => format!("{:.1}", n),
            SqlValue::Float(n) => n.to_string(),
            SqlValue::Numeric(n) => n.clone(),
            SqlValue::Text(s) => quote_literal(&truncate(s, max_len)),
        }
    }

    /// Bare form used in tab-separated sample rows.
    fn plain(&self, max_len: usize) -> String {
        match self {
            SqlValue::Text(s) => truncate(s, max_len).replace(['\t', '\n', '\r'], " "),
            other => other.repr(max_len),
        }
    }
}

fn render_create_table(table: &TableSchema) -> String {
    let columns = table
        .columns
        .iter()
        .map(|column| {
            let not_null = if column.is_nullable { "" } else { " NOT NULL" };
            format!("\t{} {}{}", column.name, column.data_type, not_null)
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!("CREATE TABLE {} (\n{}\n)", table.name, columns)
}

fn render_sample_rows(table: &TableSchema, rows: &[Vec<SqlValue>], max_len: usize) -> String {
    let header = table
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join("\t");

    let mut block = format!("/*\n{} rows from {} table:\n{}\n", rows.len(), table.name, header);
    for row in rows {
        let line = row
            .iter()
            .map(|value| value.plain(max_len))
            .collect::<Vec<_>>()
            .join("\t");
        block.push_str(&line);
        block.push('\n');
    }
    block.push_str("*/");
    block
}

/// Renders a result set as a list of tuples; no rows renders as the empty string.
fn render_rows(rows: &[Vec<SqlValue>], max_len: usize) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let tuples = rows
        .iter()
        .map(|row| {
            let values = row
                .iter()
                .map(|value| value.repr(max_len))
                .collect::<Vec<_>>();
            if values.len() == 1 {
                format!("({},)", values[0])
            } else {
                format!("({})", values.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("[{}]", tuples)
}
