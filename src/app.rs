use std::sync::{Arc, Mutex};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::application::{ChatSession, SqlChatUseCase};
use crate::domain::error::AppError;
use crate::infrastructure::config::{AppConfig, ConfigService};
use crate::infrastructure::db::PostgresConnector;
use crate::infrastructure::llm_clients::RouterClient;
use crate::interfaces::http::{self, HttpState};

fn fatal(e: AppError) -> std::io::Error {
    error!(error = %e, "Startup failed");
    std::io::Error::other(e.to_string())
}

pub async fn run() -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    if let Err(e) = dotenvy::dotenv() {
        info!("No .env file loaded: {}", e);
    }

    let mut config = AppConfig::load().map_err(fatal)?;
    let api_key = ConfigService::new()
        .resolve_api_key(config.llm.provider)
        .map_err(fatal)?;
    config.llm.api_key = Some(api_key);

    info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        base_url = %config.llm.base_url,
        "Model client configured"
    );

    let chat = Arc::new(SqlChatUseCase::new(
        Arc::new(RouterClient::new()),
        config.llm.clone(),
    ));
    let connector = Arc::new(PostgresConnector::new(config.database.clone()));
    let session = ChatSession::new(
        chat,
        connector,
        config.form.clone(),
        &config.chat.greeting,
        config.chat.model_error_policy,
    );
    info!(session_id = %session.id(), "Chat session created");

    let logs = Arc::new(Mutex::new(Vec::new()));
    http::add_log(&logs, "INFO", "App", "Warehouse Chat started");

    let server = http::start_server(
        HttpState::new(session, logs),
        &config.server.host,
        config.server.port,
    )?;
    info!(
        "Serving Warehouse Chat on http://{}:{}",
        config.server.host, config.server.port
    );

    server.await
}
