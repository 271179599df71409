use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LLMProvider {
    Groq,
    OpenAI,
}

impl LLMProvider {
    /// Environment variable consulted first when resolving the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LLMProvider::Groq => "GROQ_API_KEY",
            LLMProvider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn keyring_key(&self) -> &'static str {
        match self {
            LLMProvider::Groq => "groq",
            LLMProvider::OpenAI => "openai",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Validate)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    #[validate(length(min = 1))]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Groq,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key: None,
            max_tokens: None,
            temperature: 0.0,
        }
    }
}

impl fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "********"))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}
