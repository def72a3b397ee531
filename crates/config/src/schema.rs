/// Config schema types (telegram, backend, access, resources, server, ingress).
use std::collections::BTreeMap;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetbotConfig {
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
    pub access: AccessConfig,
    pub resources: ResourcesConfig,
    pub server: ServerConfig,
    pub ingress: IngressConfig,
    pub metrics: MetricsConfig,
}

/// Telegram bot credentials and webhook settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Path the webhook is served on. Defaults to `/telegram/<token>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_path: Option<String>,

    /// Shared secret echoed by Telegram in `X-Telegram-Bot-Api-Secret-Token`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub webhook_secret: Option<Secret<String>>,
}

impl TelegramConfig {
    /// Route the webhook is mounted on.
    #[must_use]
    pub fn resolved_webhook_path(&self) -> String {
        match self.webhook_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => {
                if path.starts_with('/') {
                    path.to_string()
                } else {
                    format!("/{path}")
                }
            },
            _ => format!("/telegram/{}", self.token.expose_secret()),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            webhook_path: None,
            webhook_secret: None,
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("webhook_path", &self.webhook_path.as_ref().map(|_| "[REDACTED]"))
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Remote spreadsheet automation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Web app URL every call goes to.
    pub url: String,
    /// Timeout for read operations (date, status).
    pub read_timeout_secs: u64,
    /// Timeout for single writes (new date, clear).
    pub write_timeout_secs: u64,
    /// Timeout for bulk updates (interval recomputation).
    pub bulk_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            read_timeout_secs: 10,
            write_timeout_secs: 20,
            bulk_timeout_secs: 30,
        }
    }
}

/// Who may talk to the bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Numeric Telegram user ids.
    pub allowlist: Vec<String>,
}

/// Backend-addressed resources (spreadsheets) the user can switch between.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Short key ("2".."5") to backend resource id.
    pub entries: BTreeMap<String, String>,
    /// Key used when a user has not picked a resource yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_key: Option<String>,
}

/// HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Externally reachable base URL used for webhook registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 10000,
            public_url: None,
        }
    }
}

/// Hand-off between webhook delivery and command processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Events buffered per user before deliveries are refused.
    pub per_user_queue: usize,
    /// Events accepted but not yet processed, across all users.
    pub max_in_flight: usize,
    /// Seconds an idle per-user worker lingers before exiting.
    pub worker_idle_secs: u64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            per_user_queue: 16,
            max_in_flight: 256,
            worker_idle_secs: 60,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the `/metrics` endpoint is served.
    pub enabled: bool,
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
