use crate::application::use_cases::sql_chat::{SqlChatUseCase, TurnOutcome};
use crate::domain::chat::{ChatHistory, ChatTurn, ModelErrorPolicy, MODEL_ERROR_APOLOGY};
use crate::domain::connection::ConnectionConfig;
use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::{DatabaseConnector, SharedDatabase};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The single interactive session: form values, the open database and the transcript.
pub struct ChatSession {
    id: Uuid,
    form: ConnectionConfig,
    database: Option<SharedDatabase>,
    history: ChatHistory,
    chat: Arc<SqlChatUseCase>,
    connector: Arc<dyn DatabaseConnector + Send + Sync>,
    model_error_policy: ModelErrorPolicy,
}

impl ChatSession {
    pub fn new(
        chat: Arc<SqlChatUseCase>,
        connector: Arc<dyn DatabaseConnector + Send + Sync>,
        form: ConnectionConfig,
        greeting: &str,
        model_error_policy: ModelErrorPolicy,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            form,
            database: None,
            history: ChatHistory::new(greeting),
            chat,
            connector,
            model_error_policy,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn form(&self) -> &ConnectionConfig {
        &self.form
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn is_connected(&self) -> bool {
        self.database.is_some()
    }

    pub fn chat(&self) -> Arc<SqlChatUseCase> {
        self.chat.clone()
    }

    /// Stores the form values and swaps in a new handle only if the connect succeeds.
    pub async fn connect(&mut self, config: ConnectionConfig) -> Result<()> {
        let attempt = self.connector.connect(&config).await;
        let target = config.display_target();
        self.form = config;

        match attempt {
            Ok(database) => {
                self.database = Some(database);
                info!(session_id = %self.id, target_db = %target, "Session connected");
                Ok(())
            }
            Err(e) => {
                warn!(
                    session_id = %self.id,
                    target_db = %target,
                    kept_previous = self.database.is_some(),
                    error = %e,
                    "Connect failed"
                );
                Err(e)
            }
        }
    }

    /// Runs one turn. Blank input is ignored and yields `Ok(None)`.
    pub async fn submit(&mut self, input: &str) -> Result<Option<TurnOutcome>> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        let database = self.database.clone().ok_or(AppError::NotConnected)?;

        self.history.push(ChatTurn::human(input));
        info!(session_id = %self.id, turns = self.history.len(), "Answering question");

        let result = self.chat.answer(database.as_ref(), &self.history, input).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(AppError::ModelError(msg))
                if self.model_error_policy == ModelErrorPolicy::Apologize =>
            {
                error!(session_id = %self.id, error = %msg, "Model call failed; answering with apology");
                TurnOutcome {
                    sql: String::new(),
                    sql_response: String::new(),
                    answer: MODEL_ERROR_APOLOGY.to_string(),
                    execution_failed: false,
                }
            }
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Turn aborted");
                return Err(e);
            }
        };

        self.history.push(ChatTurn::assistant(outcome.answer.clone()));
        Ok(Some(outcome))
    }
}
