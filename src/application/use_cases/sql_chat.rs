//! Two-step question answering over a connected database.
//!
//! `GenerateSql`: render the SQL prompt with the current schema and history,
//! ask the model, take its raw output as the query.
//! `ExecuteAndAnswer`: run that query, then ask the model to explain the
//! result in natural language. A failing query does not abort the turn; the
//! error text is handed to the model in place of the rows.

use crate::application::use_cases::prompt_engine::PromptEngine;
use crate::domain::chat::ChatHistory;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::db::SqlDatabase;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything one pass through the pipeline produced.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TurnOutcome {
    pub sql: String,
    pub sql_response: String,
    pub answer: String,
    pub execution_failed: bool,
}

pub struct SqlChatUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    config: LLMConfig,
}

impl SqlChatUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, config: LLMConfig) -> Self {
        Self { llm_client, config }
    }

    pub fn llm_client(&self) -> &Arc<dyn LLMClient + Send + Sync> {
        &self.llm_client
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    /// Step 1. Returns the model output untouched; it is not validated as SQL.
    pub async fn generate_sql(
        &self,
        database: &(dyn SqlDatabase + Send + Sync),
        history: &ChatHistory,
        question: &str,
    ) -> Result<String> {
        let schema = database.table_info().await?;
        let prompt = PromptEngine::build_sql_prompt(&schema, &history.transcript(), question)?;

        let sql = self.llm_client.complete(&self.config, &prompt).await?;
        info!(sql = %sql, "Model generated SQL");
        Ok(sql)
    }

    /// Step 2. Executes `sql` and asks the model to phrase the outcome.
    pub async fn execute_and_answer(
        &self,
        database: &(dyn SqlDatabase + Send + Sync),
        history: &ChatHistory,
        question: &str,
        sql: String,
    ) -> Result<TurnOutcome> {
        let (sql_response, execution_failed) = match database.run(&sql).await {
            Ok(rows) => (rows, false),
            Err(e) => {
                warn!(error = %e, "Generated SQL failed; passing the error to the model");
                (e.to_string(), true)
            }
        };

        let schema = match database.table_info().await {
            Ok(schema) => schema,
            Err(e) if execution_failed => {
                warn!(error = %e, "Schema unavailable after failed SQL; answering without it");
                String::new()
            }
            Err(e) => return Err(e),
        };
        let prompt = PromptEngine::build_answer_prompt(
            &schema,
            &history.transcript(),
            &sql,
            question,
            &sql_response,
        )?;

        let raw_answer = self.llm_client.complete(&self.config, &prompt).await?;
        let answer = clean_llm_response(&raw_answer);
        if answer.is_empty() {
            return Err(AppError::ModelError(
                "Model returned an empty answer".to_string(),
            ));
        }

        Ok(TurnOutcome {
            sql,
            sql_response,
            answer,
            execution_failed,
        })
    }

    pub async fn answer(
        &self,
        database: &(dyn SqlDatabase + Send + Sync),
        history: &ChatHistory,
        question: &str,
    ) -> Result<TurnOutcome> {
        let sql = self.generate_sql(database, history, question).await?;
        self.execute_and_answer(database, history, question, sql).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::ChatTurn;
    use crate::test_support::{FakeDatabase, ScriptedLlm};

    const QUESTION: &str = "Apa pendidikan terakhir yang paling banyak dimiliki pegawai?";
    const SQL: &str = "SELECT HighestEducation, COUNT(*) AS Total FROM Pendidikan GROUP BY HighestEducation ORDER BY Total DESC LIMIT 1;";

    fn history_with_question() -> ChatHistory {
        let mut history = ChatHistory::default();
        history.push(ChatTurn::human(QUESTION));
        history
    }

    #[tokio::test]
    async fn test_generated_sql_reaches_the_database_verbatim() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(SQL.to_string()),
            Ok("Pendidikan terakhir terbanyak adalah S1 dengan 42 pegawai.".to_string()),
        ]));
        let database = FakeDatabase::with_rows("[('S1', 42)]");
        let use_case = SqlChatUseCase::new(llm.clone(), LLMConfig::default());

        let outcome = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await
            .unwrap();

        assert_eq!(database.executed(), vec![SQL.to_string()]);
        assert_eq!(outcome.sql, SQL);
        assert_eq!(outcome.sql_response, "[('S1', 42)]");
        assert!(!outcome.execution_failed);
        assert!(!outcome.answer.is_empty());

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains(&format!("Pertanyaan: {}\nSQL Query:", QUESTION)));
        assert!(prompts[0].contains(&format!("Human: {}", QUESTION)));
        assert!(prompts[1].contains(&format!("<SQL>{}</SQL>", SQL)));
        assert!(prompts[1].contains("Respons SQL: [('S1', 42)]"));
    }

    #[tokio::test]
    async fn test_execution_error_is_explained_not_raised() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("SELECT * FROM pegawai_tidak_ada;".to_string()),
            Ok("Tabel yang diminta tidak ditemukan di database.".to_string()),
        ]));
        let database = FakeDatabase::failing("relation \"pegawai_tidak_ada\" does not exist");
        let use_case = SqlChatUseCase::new(llm.clone(), LLMConfig::default());

        let outcome = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await
            .unwrap();

        assert!(outcome.execution_failed);
        assert_eq!(outcome.answer, "Tabel yang diminta tidak ditemukan di database.");
        assert!(outcome.sql_response.contains("does not exist"));
        assert!(llm.prompts()[1].contains("relation \"pegawai_tidak_ada\" does not exist"));
    }

    #[tokio::test]
    async fn test_schema_is_recomputed_for_each_prompt() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("SELECT 1;".to_string()),
            Ok("Satu.".to_string()),
        ]));
        let database = FakeDatabase::with_rows("[(1,)]");
        let use_case = SqlChatUseCase::new(llm, LLMConfig::default());

        use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await
            .unwrap();

        assert_eq!(database.schema_reads(), 2);
    }

    #[tokio::test]
    async fn test_model_error_in_first_step_skips_execution() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(AppError::ModelError(
            "API error (429 Too Many Requests)".to_string(),
        ))]));
        let database = FakeDatabase::with_rows("");
        let use_case = SqlChatUseCase::new(llm, LLMConfig::default());

        let result = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await;

        assert!(matches!(result, Err(AppError::ModelError(_))));
        assert!(database.executed().is_empty());
    }

    #[tokio::test]
    async fn test_answer_is_cleaned() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("SELECT 1;".to_string()),
            Ok("<think>ok</think>\nRespons dalam Bahasa Alami: Satu.".to_string()),
        ]));
        let database = FakeDatabase::with_rows("[(1,)]");
        let use_case = SqlChatUseCase::new(llm, LLMConfig::default());

        let outcome = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Satu.");
    }

    #[tokio::test]
    async fn test_answer_empty_after_cleaning_is_model_error() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("SELECT 1;".to_string()),
            Ok("<think>hanya berpikir</think>\n".to_string()),
        ]));
        let database = FakeDatabase::with_rows("[(1,)]");
        let use_case = SqlChatUseCase::new(llm, LLMConfig::default());

        let result = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await;

        assert!(matches!(result, Err(AppError::ModelError(msg)) if msg.contains("empty answer")));
    }

    #[tokio::test]
    async fn test_schema_failure_after_execution_error_still_answers() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("SELECT * FROM pegawai_tidak_ada;".to_string()),
            Ok("Query gagal dijalankan.".to_string()),
        ]));
        let database = FakeDatabase::failing("current transaction is aborted");
        database.fail_schema_after(1);
        let use_case = SqlChatUseCase::new(llm.clone(), LLMConfig::default());

        let outcome = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await
            .unwrap();

        assert!(outcome.execution_failed);
        assert_eq!(outcome.answer, "Query gagal dijalankan.");
        assert!(llm.prompts()[1].contains("<SCHEMA></SCHEMA>"));
    }

    #[tokio::test]
    async fn test_schema_failure_after_successful_execution_is_raised() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("SELECT 1;".to_string())]));
        let database = FakeDatabase::with_rows("[(1,)]");
        database.fail_schema_after(1);
        let use_case = SqlChatUseCase::new(llm, LLMConfig::default());

        let result = use_case
            .answer(&database, &history_with_question(), QUESTION)
            .await;

        assert!(matches!(result, Err(AppError::ExecutionError(_))));
    }
}
