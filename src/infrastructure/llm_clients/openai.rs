use super::LLMClient;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    id: String,
}

/// Client for any endpoint implementing the OpenAI chat-completions API (Groq, OpenAI).
pub struct OpenAICompatibleClient {
    client: reqwest::Client,
}

impl OpenAICompatibleClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn api_key(config: &LLMConfig) -> Result<&str> {
        config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::ModelError(format!("Missing API key for {:?}", config.provider)))
    }

    fn endpoint(base_url: &str, path: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), path)
    }

    fn build_request<'a>(config: &'a LLMConfig, prompt: &'a str) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn parse_completion(body: ChatCompletionResponse) -> Result<String> {
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::ModelError("Invalid response format: no completion".to_string()))
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(AppError::ModelError(format!("API error ({}): {}", status, text)))
    }
}

impl Default for OpenAICompatibleClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, config: &LLMConfig, prompt: &str) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let url = Self::endpoint(&config.base_url, "chat/completions");
        let body = Self::build_request(config, prompt);

        info!(model = %config.model, prompt_chars = prompt.len(), "Requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ModelError(format!("Request failed: {}", e)))?;
        let response = Self::ensure_success(response).await?;

        let json: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelError(format!("Failed to parse JSON: {}", e)))?;

        Self::parse_completion(json)
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let api_key = Self::api_key(config)?;
        let url = Self::endpoint(&config.base_url, "models");

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| AppError::ModelError(format!("Request failed: {}", e)))?;
        let response = Self::ensure_success(response).await?;

        let json: ModelsResponse = response
            .json()
            .await
            .map_err(|e| AppError::ModelError(format!("Failed to parse JSON: {}", e)))?;

        Ok(json.data.into_iter().map(|model| model.id).collect())
    }
}
