use serde::{Deserialize, Serialize};

pub const DEFAULT_GREETING: &str = "Hello! Aku Asistenmu!";

pub const MODEL_ERROR_APOLOGY: &str =
    "Maaf, layanan model bahasa sedang tidak dapat dihubungi. Silakan coba lagi.";

/// What a turn does when a language-model call fails.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorPolicy {
    /// Abort the turn and show the error. No assistant turn is recorded.
    #[default]
    Surface,
    /// Record a fixed apology as the assistant turn and log the error.
    Apologize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Human,
    Assistant,
}

impl ChatRole {
    /// Label shown on transcript bubbles and used in prompt history.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::Human => "Human",
            ChatRole::Assistant => "AI",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    role: ChatRole,
    content: String,
}

impl ChatTurn {
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Append-only conversation log. Always starts with the assistant greeting.
#[derive(Debug, Clone, Serialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    pub fn new(greeting: &str) -> Self {
        Self {
            turns: vec![ChatTurn::assistant(greeting)],
        }
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Renders the history the way it is fed into prompts: one `Label: content` line per turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role().label(), turn.content()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}
