pub mod openai;

use crate::domain::error::Result;
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use async_trait::async_trait;
use openai::OpenAICompatibleClient;

#[async_trait]
pub trait LLMClient {
    /// Sends the rendered prompt as a single user message and returns the raw completion.
    async fn complete(&self, config: &LLMConfig, prompt: &str) -> Result<String>;
    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>>;
}

/// Dispatches on the configured provider.
pub struct RouterClient {
    openai: OpenAICompatibleClient,
}

impl RouterClient {
    pub fn new() -> Self {
        Self {
            openai: OpenAICompatibleClient::new(),
        }
    }
}

impl Default for RouterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn complete(&self, config: &LLMConfig, prompt: &str) -> Result<String> {
        match config.provider {
            LLMProvider::Groq | LLMProvider::OpenAI => self.openai.complete(config, prompt).await,
        }
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        match config.provider {
            LLMProvider::Groq | LLMProvider::OpenAI => self.openai.list_models(config).await,
        }
    }
}
