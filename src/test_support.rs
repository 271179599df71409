//! Scripted stand-ins for the model client, the database and the connector.

use crate::domain::connection::ConnectionConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::db::{DatabaseConnector, SharedDatabase, SqlDatabase};
use crate::infrastructure::llm_clients::LLMClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FAKE_SCHEMA: &str = "CREATE TABLE tb_pegawai(status_pegawai text)";

/// Replies with queued completions in order and records every prompt.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMClient for ScriptedLlm {
    async fn complete(&self, _config: &LLMConfig, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::ModelError("script exhausted".to_string())))
    }

    async fn list_models(&self, _config: &LLMConfig) -> Result<Vec<String>> {
        Ok(vec!["llama-3.1-8b-instant".to_string()])
    }
}

/// Returns a fixed schema and a fixed result (or error) for every query.
pub struct FakeDatabase {
    rows: std::result::Result<String, String>,
    executed: Mutex<Vec<String>>,
    schema_reads: AtomicUsize,
    schema_limit: AtomicUsize,
}

impl FakeDatabase {
    pub fn with_rows(rows: &str) -> Self {
        Self {
            rows: Ok(rows.to_string()),
            executed: Mutex::new(Vec::new()),
            schema_reads: AtomicUsize::new(0),
            schema_limit: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            rows: Err(message.to_string()),
            executed: Mutex::new(Vec::new()),
            schema_reads: AtomicUsize::new(0),
            schema_limit: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Schema reads after the first `reads` fail.
    pub fn fail_schema_after(&self, reads: usize) {
        self.schema_limit.store(reads, Ordering::SeqCst);
    }

    pub fn schema_reads(&self) -> usize {
        self.schema_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SqlDatabase for FakeDatabase {
    async fn table_info(&self) -> Result<String> {
        let previous = self.schema_reads.fetch_add(1, Ordering::SeqCst);
        if previous >= self.schema_limit.load(Ordering::SeqCst) {
            return Err(AppError::ExecutionError(
                "Failed to describe schema: current transaction is aborted".to_string(),
            ));
        }
        Ok(FAKE_SCHEMA.to_string())
    }

    async fn run(&self, sql: &str) -> Result<String> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.rows.clone().map_err(AppError::ExecutionError)
    }
}

/// Hands out one shared database, or fails while a failure message is set.
pub struct FakeConnector {
    database: Option<Arc<FakeDatabase>>,
    failure: Mutex<Option<String>>,
    attempts: Mutex<Vec<ConnectionConfig>>,
}

impl FakeConnector {
    pub fn succeeding(database: Arc<FakeDatabase>) -> Self {
        Self {
            database: Some(database),
            failure: Mutex::new(None),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            database: None,
            failure: Mutex::new(Some(message.to_string())),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(str::to_string);
    }

    pub fn attempts(&self) -> Vec<ConnectionConfig> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseConnector for FakeConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<SharedDatabase> {
        self.attempts.lock().unwrap().push(config.clone());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AppError::ConnectionError(message));
        }
        match &self.database {
            Some(database) => Ok(database.clone() as SharedDatabase),
            None => Err(AppError::ConnectionError("no database configured".to_string())),
        }
    }
}
