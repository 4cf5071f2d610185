//! Reply delivery: the console, or the Telegram Bot API via teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::bot::engine::Reply;

/// Where replies are sent.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Deliver a reply, returning the platform message id when there is one.
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<Option<i64>, String>;
}

/// Logs replies instead of sending them.
pub struct ConsoleOutbox;

#[async_trait]
impl Outbox for ConsoleOutbox {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<Option<i64>, String> {
        info!("📤 {}", console_line(chat_id, reply));
        Ok(None)
    }
}

/// The reply as the Bot API would receive it: text plus `reply_markup` JSON.
fn console_line(chat_id: i64, reply: &Reply) -> String {
    match &reply.keyboard {
        Some(keyboard) => format!("To {chat_id}: {:?} reply_markup={}", reply.text, keyboard.to_wire()),
        None => format!("To {chat_id}: {:?}", reply.text),
    }
}

/// Keeps every reply in memory, for tests and the demo session.
#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<(i64, Reply)>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(i64, Reply)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<Option<i64>, String> {
        let mut sent = self.sent.lock().await;
        sent.push((chat_id, reply.clone()));
        Ok(Some(sent.len() as i64))
    }
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbox for TelegramClient {
    async fn send(&self, chat_id: i64, reply: &Reply) -> Result<Option<i64>, String> {
        let mut request = self
            .bot
            .send_message(ChatId(chat_id), &reply.text)
            .parse_mode(ParseMode::Html);

        if let Some(ref keyboard) = reply.keyboard {
            request = request.reply_markup(keyboard.to_markup());
        }

        request.await.map(|msg| Some(msg.id.0 as i64)).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }
}
