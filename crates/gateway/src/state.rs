use {
    secrecy::{ExposeSecret, Secret},
    sheetbot_telegram::IngressBridge,
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::MetricsHandle;

/// Everything the HTTP handlers need.
pub struct GatewayState {
    pub bridge: IngressBridge,
    /// Route the webhook is served on (contains the bot token by default).
    pub webhook_path: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`, when configured.
    pub webhook_secret: Option<Secret<String>>,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<MetricsHandle>,
}

impl GatewayState {
    pub fn new(bridge: IngressBridge, webhook_path: impl Into<String>) -> Self {
        Self {
            bridge,
            webhook_path: webhook_path.into(),
            webhook_secret: None,
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        }
    }

    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Option<Secret<String>>) -> Self {
        self.webhook_secret = secret;
        self
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, handle: MetricsHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Whether a delivery carrying `provided` may be accepted.
    pub fn secret_matches(&self, provided: Option<&str>) -> bool {
        match &self.webhook_secret {
            None => true,
            Some(expected) => provided == Some(expected.expose_secret().as_str()),
        }
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("webhook_path", &"[REDACTED]")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}
