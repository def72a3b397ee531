use {sheetbot_common::UserId, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    /// The user's queue is full; the caller should ask Telegram to retry.
    #[error("ingress queue for user {user} is full")]
    Saturated { user: UserId },

    #[error("ingress is shutting down")]
    ShuttingDown,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Whether Telegram should redeliver the update later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Saturated { .. } | Self::ShuttingDown)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
