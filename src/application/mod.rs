pub mod use_cases;

pub use use_cases::chat_session::ChatSession;
pub use use_cases::sql_chat::{SqlChatUseCase, TurnOutcome};
