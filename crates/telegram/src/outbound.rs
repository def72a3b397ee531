use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    sheetbot_common::ChatId,
    sheetbot_routing::{Reply, ReplyMenu},
    teloxide::{
        RequestError,
        payloads::SendMessageSetters,
        prelude::*,
        types::{KeyboardButton, KeyboardMarkup, KeyboardRemove},
    },
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::{counter, telegram as tg_metrics};

use crate::error::Result;

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Where replies go. Rendering of the menu belongs to the implementation.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> Result<()>;
}

/// Sends replies through the Bot API with a fixed main keyboard.
pub struct TelegramOutbound {
    bot: Bot,
    menu: KeyboardMarkup,
}

impl TelegramOutbound {
    /// `menu_rows` are the label rows of the main keyboard.
    pub fn new(bot: Bot, menu_rows: Vec<Vec<String>>) -> Self {
        Self {
            bot,
            menu: main_keyboard(menu_rows),
        }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        chat: ChatId,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };
                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = %chat,
                            operation,
                            retries,
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }
                    retries += 1;
                    warn!(
                        chat_id = %chat,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl ReplyChannel for TelegramOutbound {
    async fn send_reply(&self, chat: ChatId, reply: &Reply) -> Result<()> {
        let chat_id = teloxide::types::ChatId(chat.0);
        let result = self
            .run_with_retry(chat, "send message", || {
                let request = self.bot.send_message(chat_id, reply.text.as_str());
                let request = match reply.menu {
                    ReplyMenu::Main => request.reply_markup(self.menu.clone()),
                    ReplyMenu::Remove => request.reply_markup(KeyboardRemove::new()),
                    ReplyMenu::None => request,
                };
                async move { request.await }
            })
            .await;

        match result {
            Ok(_) => {
                debug!(chat_id = %chat, menu = ?reply.menu, "reply sent");
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::MESSAGES_SENT_TOTAL).increment(1);
                Ok(())
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(tg_metrics::MESSAGE_SEND_ERRORS_TOTAL).increment(1);
                Err(e.into())
            },
        }
    }
}

/// Resizable reply keyboard from label rows.
pub fn main_keyboard(rows: Vec<Vec<String>>) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}
