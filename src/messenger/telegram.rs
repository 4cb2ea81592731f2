use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, LinkPreviewOptions, MessageId, Recipient, User,
};
use tracing::{debug, info, warn};

use super::{
    Button, ChatTarget, IncomingCallback, IncomingMessage, Keyboard, Messenger, SentMessage,
    Sender,
};
use crate::conversation::Conversation;

/// `Messenger` backed by the Telegram Bot API.
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn to_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.into_iter().map(|row| {
        row.into_iter()
            .map(|button| match button {
                Button::Callback { label, payload } => InlineKeyboardButton::callback(label, payload),
                Button::Link { label, url } => InlineKeyboardButton::url(label, url),
            })
            .collect::<Vec<_>>()
    }))
}

fn to_recipient(target: &ChatTarget) -> Recipient {
    match target {
        ChatTarget::Id(id) => Recipient::Id(ChatId(*id)),
        ChatTarget::Username(name) => Recipient::ChannelUsername(name.clone()),
    }
}

fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage> {
        let sent = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(SentMessage {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn send_plain(&self, target: &ChatTarget, text: &str) -> Result<()> {
        self.bot
            .send_message(to_recipient(target), text)
            .link_preview_options(no_preview())
            .await?;
        Ok(())
    }

    async fn edit_text(
        &self,
        message: SentMessage,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        let mut request = self.bot.edit_message_text(
            ChatId(message.chat_id),
            MessageId(message.message_id),
            text,
        );
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(to_markup(keyboard));
        }
        request.await?;
        Ok(())
    }
}

fn to_sender(user: &User) -> Sender {
    Sender {
        id: user.id.0,
        first_name: user.first_name.clone(),
        username: user.username.clone(),
    }
}

/// Our own username, used to tell `/start@us` from `/start@someone_else`.
pub async fn bot_username(bot: &Bot) -> Result<Option<String>> {
    let me = bot.get_me().await?;
    Ok(me.user.username.clone())
}

/// Run the update dispatcher until shutdown.
pub async fn run(bot: Bot, conversation: Arc<Conversation>) -> Result<()> {
    info!("Starting Telegram dispatcher...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![conversation])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, conversation: Arc<Conversation>) -> Result<()> {
    // Channel posts have no sender
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let incoming = IncomingMessage {
        chat_id: msg.chat.id.0,
        sender: to_sender(user),
        text: text.to_string(),
    };

    let outcome = conversation.handle_message(&incoming).await?;
    debug!("Message from {} handled: {:?}", incoming.sender.id, outcome);
    Ok(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    conversation: Arc<Conversation>,
) -> Result<()> {
    // Stop the client's loading spinner whatever happens next.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!("Failed to answer callback query: {}", e);
    }

    let incoming = IncomingCallback {
        sender: to_sender(&q.from),
        data: q.data.clone(),
        message: q.message.as_ref().map(|m| SentMessage {
            chat_id: m.chat().id.0,
            message_id: m.id().0,
        }),
    };

    let outcome = conversation.handle_callback(&incoming).await?;
    debug!("Callback from {} handled: {:?}", incoming.sender.id, outcome);
    Ok(())
}
