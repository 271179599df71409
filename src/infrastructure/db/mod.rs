pub mod postgres;

use crate::domain::connection::ConnectionConfig;
use crate::domain::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

pub use postgres::{PostgresConnector, PostgresDatabase};

pub type SharedDatabase = Arc<dyn SqlDatabase + Send + Sync>;

/// An open database the chat pipeline can inspect and query.
#[async_trait]
pub trait SqlDatabase {
    /// Human-readable listing of tables and columns, used as model context.
    async fn table_info(&self) -> Result<String>;
    /// Runs the SQL text as given and renders the rows as text.
    async fn run(&self, sql: &str) -> Result<String>;
}

#[async_trait]
pub trait DatabaseConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<SharedDatabase>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DbConnectionConfig {
    /// Upper bound on how long a connect attempt may block
    #[validate(range(min = 1, max = 300))]
    pub connect_timeout_secs: u64,
    /// Sample rows appended to each table in the schema text (0 disables)
    #[validate(range(max = 100))]
    pub sample_rows_in_table_info: usize,
    /// Longer string values are truncated in rendered results
    #[validate(range(min = 10))]
    pub max_string_length: usize,
}

impl Default for DbConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            sample_rows_in_table_info: 3,
            max_string_length: 300,
        }
    }
}
