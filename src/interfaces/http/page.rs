use crate::domain::chat::{ChatHistory, ChatRole};
use crate::domain::connection::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

pub const PAGE_TITLE: &str = "Warehouse Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// One-shot message shown after a form action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

pub struct PageView<'a> {
    pub form: &'a ConnectionConfig,
    pub history: &'a ChatHistory,
    pub connected: bool,
    pub notice: Option<Notice>,
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; display: flex; min-height: 100vh; }
aside { width: 18rem; padding: 1.5rem; background: #f0f2f6; }
aside label { display: block; margin-top: 0.75rem; font-size: 0.85rem; }
aside input { width: 100%; box-sizing: border-box; padding: 0.4rem; }
aside button { margin-top: 1rem; width: 100%; padding: 0.5rem; }
main { flex: 1; padding: 1.5rem 2rem; display: flex; flex-direction: column; }
.transcript { flex: 1; }
.bubble { margin: 0.75rem 0; padding: 0.75rem 1rem; border-radius: 0.5rem; white-space: pre-wrap; }
.bubble .role { font-weight: 600; display: block; margin-bottom: 0.25rem; }
.bubble.ai { background: #f7f7f9; }
.bubble.human { background: #e8f0fe; }
.notice { padding: 0.5rem 0.75rem; border-radius: 0.25rem; margin-top: 1rem; }
.notice.success { background: #dff5e3; }
.notice.error { background: #fde2e1; }
.status { font-size: 0.85rem; margin-top: 0.5rem; }
.chat-input { display: flex; gap: 0.5rem; }
.chat-input input { flex: 1; padding: 0.6rem; }
"#;

const SUBMIT_SCRIPT: &str = r#"
document.querySelectorAll('form').forEach(function (form) {
  form.addEventListener('submit', function () {
    form.querySelectorAll('button').forEach(function (button) {
      button.disabled = true;
      button.textContent = button.dataset.busy || button.textContent;
    });
  });
});
"#;

fn render_field(out: &mut String, label: &str, name: &str, kind: &str, value: &str) {
    let _ = write!(
        out,
        r#"<label>{label}<input type="{kind}" name="{name}" value="{value}"></label>"#,
        label = label,
        kind = kind,
        name = name,
        value = escape_html(value),
    );
}

fn render_sidebar(out: &mut String, view: &PageView<'_>) {
    out.push_str("<aside><h3>Settings</h3>");
    out.push_str(
        "<p>This is a simple chat application using PostgreSQL. Connect to the database and start chatting.</p>",
    );
    out.push_str(r#"<form method="post" action="/connect">"#);
    render_field(out, "Host", "host", "text", &view.form.host);
    render_field(out, "Port", "port", "text", &view.form.port);
    render_field(out, "User", "user", "text", &view.form.user);
    // The stored password is never echoed back into the page.
    render_field(out, "Password", "password", "password", "");
    render_field(out, "Database", "database", "text", &view.form.database);
    out.push_str(
        r#"<button type="submit" data-busy="Connecting to database...">Connect</button></form>"#,
    );

    let status = if view.connected {
        format!("Connected to {}", escape_html(&view.form.display_target()))
    } else {
        "Not connected".to_string()
    };
    let _ = write!(out, r#"<div class="status">{}</div>"#, status);

    if let Some(notice) = &view.notice {
        let class = match notice.kind {
            NoticeKind::Success => "success",
            NoticeKind::Error => "error",
        };
        let _ = write!(
            out,
            r#"<div class="notice {}">{}</div>"#,
            class,
            escape_html(&notice.message)
        );
    }
    out.push_str("</aside>");
}

fn render_transcript(out: &mut String, history: &ChatHistory) {
    out.push_str(r#"<section class="transcript">"#);
    for turn in history.turns() {
        let class = match turn.role() {
            ChatRole::Assistant => "ai",
            ChatRole::Human => "human",
        };
        let _ = write!(
            out,
            r#"<div class="bubble {}"><span class="role">{}</span>{}</div>"#,
            class,
            turn.role().label(),
            escape_html(turn.content())
        );
    }
    out.push_str("</section>");
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut out = String::with_capacity(4096);
    let _ = write!(
        out,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title><style>{style}</style></head><body>",
        title = PAGE_TITLE,
        style = STYLE
    );

    render_sidebar(&mut out, view);

    let _ = write!(out, "<main><h1>{}</h1>", PAGE_TITLE);
    render_transcript(&mut out, view.history);
    out.push_str(
        r#"<form class="chat-input" method="post" action="/chat"><input type="text" name="message" placeholder="Type a message..." autocomplete="off" autofocus><button type="submit" data-busy="Thinking...">Send</button></form>"#,
    );
    out.push_str("</main>");

    let _ = write!(out, "<script>{}</script></body></html>", SUBMIT_SCRIPT);
    out
}
