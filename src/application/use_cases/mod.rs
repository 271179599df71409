pub mod chat_session;
pub mod prompt_engine;
pub mod sql_chat;
