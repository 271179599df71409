use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::domain::chat::{ModelErrorPolicy, DEFAULT_GREETING};
use crate::domain::connection::ConnectionConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{LLMConfig, LLMProvider};
use crate::infrastructure::db::DbConnectionConfig;
use crate::infrastructure::security::keyring::KeyringManager;

pub const CONFIG_FILE_ENV: &str = "WAREHOUSE_CHAT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "warehouse-chat.toml";
pub const ENV_PREFIX: &str = "WAREHOUSE_CHAT_";
const KEYRING_SERVICE: &str = "WarehouseChat";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub greeting: String,
    pub model_error_policy: ModelErrorPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            model_error_policy: ModelErrorPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub llm: LLMConfig,
    #[validate(nested)]
    pub database: DbConnectionConfig,
    pub chat: ChatConfig,
    /// Initial values of the sidebar connection form.
    pub form: ConnectionConfig,
}

impl AppConfig {
    /// Loads defaults, then the TOML file, then `WAREHOUSE_CHAT_*` environment variables.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        info!(config_file = %path, "Loading configuration");

        Self::from_figment(
            Figment::from(Serialized::defaults(AppConfig::default()))
                .merge(Toml::file(&path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigService {
    keyring: KeyringManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            keyring: KeyringManager::new(KEYRING_SERVICE),
        }
    }

    /// Provider environment variable first, then the OS keychain.
    pub fn resolve_api_key(&self, provider: LLMProvider) -> Result<String> {
        if let Ok(key) = std::env::var(provider.api_key_env()) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }

        self.keyring
            .get_secret(provider.keyring_key())
            .map_err(|e| {
                AppError::ConfigError(format!(
                    "No API key for {:?}: set {} or store it in the OS keychain (service '{}', key '{}'): {}",
                    provider,
                    provider.api_key_env(),
                    KEYRING_SERVICE,
                    provider.keyring_key(),
                    e
                ))
            })
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
