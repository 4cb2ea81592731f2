pub mod telegram;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Who sent an update.
#[derive(Debug, Clone)]
pub struct Sender {
    pub id: u64,
    pub first_name: String,
    pub username: Option<String>,
}

/// A text message received from the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub sender: Sender,
    pub text: String,
}

/// A button press. `message` is the message carrying the keyboard, when
/// the platform still has it.
#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub sender: Sender,
    pub data: Option<String>,
    pub message: Option<SentMessage>,
}

/// Handle to a message the bot has sent, used to edit it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Destination for messages not tied to an inbound update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatTarget {
    Id(i64),
    /// Public channel username, including the leading `@`.
    Username(String),
}

impl ChatTarget {
    /// Numeric strings are chat ids, anything else is a channel username.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(id) => ChatTarget::Id(id),
            Err(_) if raw.starts_with('@') => ChatTarget::Username(raw.to_string()),
            Err(_) => ChatTarget::Username(format!("@{raw}")),
        }
    }
}

impl fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatTarget::Id(id) => write!(f, "{id}"),
            ChatTarget::Username(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    /// Sends the payload back to the bot when pressed.
    Callback { label: String, payload: String },
    /// Opens the url in the client.
    Link { label: String, url: reqwest::Url },
}

/// Inline keyboard: rows of buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// Outbound side of the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage>;

    /// Send without link previews; used for the audit mirror.
    async fn send_plain(&self, target: &ChatTarget, text: &str) -> Result<()>;

    async fn edit_text(
        &self,
        message: SentMessage,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;
}
