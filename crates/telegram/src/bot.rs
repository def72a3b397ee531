use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        payloads::SetWebhookSetters,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tracing::{info, warn},
    url::Url,
};

use crate::error::{Error, Result};

/// Build a bot client. `api_url` overrides the Bot API endpoint (tests).
pub fn build_bot(token: &Secret<String>, api_url: Option<Url>) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::message(format!("failed to build telegram http client: {e}")))?;
    let bot = Bot::with_client(token.expose_secret(), client);
    Ok(match api_url {
        Some(url) => bot.set_api_url(url),
        None => bot,
    })
}

/// Full webhook URL from the public base URL and the route path.
pub fn webhook_url(public_url: &str, path: &str) -> Result<Url> {
    let base = public_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Url::parse(&format!("{base}/{path}"))
        .map_err(|e| Error::message(format!("invalid webhook URL: {e}")))
}

/// Point Telegram at our webhook.
///
/// Any previous webhook is deleted first. `secret` is echoed back by Telegram
/// in the `X-Telegram-Bot-Api-Secret-Token` header.
pub async fn register_webhook(bot: &Bot, url: Url, secret: Option<&Secret<String>>) -> Result<()> {
    bot.delete_webhook().await?;

    let host = url.host_str().unwrap_or_default().to_string();
    let mut request = bot
        .set_webhook(url)
        .allowed_updates(vec![AllowedUpdate::Message]);
    if let Some(secret) = secret {
        request = request.secret_token(secret.expose_secret().clone());
    }
    request.await?;

    let commands = vec![BotCommand::new("start", "Показать меню")];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    // The path carries the token; log only the host.
    info!(host = %host, "telegram webhook registered");
    Ok(())
}
