pub mod page;

use crate::application::use_cases::chat_session::ChatSession;
use crate::application::use_cases::sql_chat::TurnOutcome;
use crate::domain::chat::ChatTurn;
use crate::domain::connection::ConnectionConfig;
use crate::domain::error::AppError;
use actix_cors::Cors;
use actix_web::http::{header, StatusCode};
use actix_web::{dev::Server, get, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Local;
use page::{Notice, PageView};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub session: tokio::sync::Mutex<ChatSession>,
    pub notice: Mutex<Option<Notice>>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

impl HttpState {
    pub fn new(session: ChatSession, logs: Arc<Mutex<Vec<LogEntry>>>) -> Self {
        Self {
            session: tokio::sync::Mutex::new(session),
            notice: Mutex::new(None),
            logs,
        }
    }

    fn set_notice(&self, notice: Notice) {
        *lock(&self.notice) = Some(notice);
    }

    fn take_notice(&self) -> Option<Notice> {
        lock(&self.notice).take()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
pub struct ConnectResponse {
    pub connected: bool,
    pub target: String,
}

#[derive(Serialize)]
pub struct HistoryResponse<'a> {
    pub session_id: String,
    pub connected: bool,
    pub turns: &'a [ChatTurn],
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::ConnectionError(_) | AppError::ModelError(_) => StatusCode::BAD_GATEWAY,
        AppError::NotConnected => StatusCode::CONFLICT,
        AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &AppError) -> HttpResponse {
    HttpResponse::build(status_for(err)).json(ErrorBody {
        error: err.to_string(),
    })
}

fn redirect_home() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/"))
        .finish()
}

#[get("/")]
async fn index(data: web::Data<HttpState>) -> impl Responder {
    let notice = data.take_notice();
    let session = data.session.lock().await;

    let html = page::render_page(&PageView {
        form: session.form(),
        history: session.history(),
        connected: session.is_connected(),
        notice,
    });

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}

async fn connect_session(data: &HttpState, config: ConnectionConfig) -> Result<String, AppError> {
    let target = config.display_target();
    add_log(
        &data.logs,
        "INFO",
        "Database",
        &format!("Connecting to {}", target),
    );

    let mut session = data.session.lock().await;
    match session.connect(config).await {
        Ok(()) => {
            add_log(
                &data.logs,
                "INFO",
                "Database",
                &format!("Connected to {}", target),
            );
            Ok(target)
        }
        Err(e) => {
            add_log(
                &data.logs,
                "ERROR",
                "Database",
                &format!("Connection to {} failed: {}", target, e),
            );
            Err(e)
        }
    }
}

#[post("/connect")]
async fn connect_form(
    data: web::Data<HttpState>,
    form: web::Form<ConnectionConfig>,
) -> impl Responder {
    match connect_session(&data, form.into_inner()).await {
        Ok(_) => data.set_notice(Notice::success("Connected to database!")),
        Err(e) => data.set_notice(Notice::error(e.to_string())),
    }
    redirect_home()
}

#[post("/chat")]
async fn chat_form(data: web::Data<HttpState>, form: web::Form<ChatRequest>) -> impl Responder {
    if let Err(e) = submit_message(&data, &form.message).await {
        data.set_notice(Notice::error(e.to_string()));
    }
    redirect_home()
}

async fn submit_message(
    data: &HttpState,
    message: &str,
) -> Result<Option<TurnOutcome>, AppError> {
    let mut session = data.session.lock().await;
    match session.submit(message).await {
        Ok(Some(outcome)) => {
            add_log(
                &data.logs,
                if outcome.execution_failed { "WARN" } else { "INFO" },
                "Chat",
                &format!(
                    "Answered with SQL ({} chars), execution_failed={}",
                    outcome.sql.len(),
                    outcome.execution_failed
                ),
            );
            Ok(Some(outcome))
        }
        Ok(None) => Ok(None),
        Err(e) => {
            add_log(&data.logs, "ERROR", "Chat", &format!("Turn failed: {}", e));
            Err(e)
        }
    }
}

#[get("/history")]
async fn get_history(data: web::Data<HttpState>) -> impl Responder {
    let session = data.session.lock().await;
    HttpResponse::Ok().json(HistoryResponse {
        session_id: session.id().to_string(),
        connected: session.is_connected(),
        turns: session.history().turns(),
    })
}

#[post("/connect")]
async fn connect_api(
    data: web::Data<HttpState>,
    config: web::Json<ConnectionConfig>,
) -> impl Responder {
    match connect_session(&data, config.into_inner()).await {
        Ok(target) => HttpResponse::Ok().json(ConnectResponse {
            connected: true,
            target,
        }),
        Err(e) => error_response(&e),
    }
}

#[post("/chat")]
async fn chat_api(data: web::Data<HttpState>, req: web::Json<ChatRequest>) -> impl Responder {
    match submit_message(&data, &req.message).await {
        Ok(Some(outcome)) => HttpResponse::Ok().json(outcome),
        Ok(None) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(&e),
    }
}

#[post("/models")]
async fn list_models(data: web::Data<HttpState>) -> impl Responder {
    let chat = {
        let session = data.session.lock().await;
        session.chat()
    };
    let config = chat.config();
    add_log(
        &data.logs,
        "INFO",
        "HttpApi",
        &format!(
            "Fetching models (provider={:?} base_url={})",
            config.provider, config.base_url
        ),
    );

    match chat.llm_client().list_models(config).await {
        Ok(models) => HttpResponse::Ok().json(models),
        Err(e) => {
            add_log(
                &data.logs,
                "ERROR",
                "HttpApi",
                &format!("Failed to list models: {}", e),
            );
            error_response(&e)
        }
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = lock(&*data.logs);
    HttpResponse::Ok().json(&*logs)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = lock(logs);
    logs.push(entry.clone());
    if logs.len() > MAX_LOG_ENTRIES {
        logs.remove(0);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

/// Registers the page routes and the JSON API under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(connect_form)
        .service(chat_form)
        .service(
            web::scope("/api")
                .wrap(Cors::permissive())
                .service(get_history)
                .service(connect_api)
                .service(chat_api)
                .service(list_models)
                .service(get_logs),
        );
}

pub fn start_server(state: HttpState, host: &str, port: u16) -> std::io::Result<Server> {
    let state = web::Data::new(state);

    let server = HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind((host, port))?
        .run();

    Ok(server)
}
