//! Telegram side of the bot: webhook update decoding, the per-user ingress
//! bridge, reply delivery, and webhook registration.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod ingress;
pub mod outbound;
pub mod restart;

pub use {
    error::{Error, Result},
    handlers::{TelegramHandler, parse_update},
    ingress::{IncomingMessage, IngressBridge, IngressSettings, UpdateProcessor},
    outbound::{ReplyChannel, TelegramOutbound},
    restart::RestartSignal,
};
