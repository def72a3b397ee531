//! Configuration validation.
//!
//! Collects every problem in one pass so an operator fixes the whole
//! deployment at once instead of one restart per missing variable.

use {secrecy::ExposeSecret, url::Url};

use crate::{
    error::{Error, Result},
    schema::SheetbotConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "backend.url"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Turn error diagnostics into [`Error::Invalid`].
    pub fn into_result(self) -> Result<()> {
        let problems: Vec<Diagnostic> = self
            .diagnostics
            .into_iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Invalid { problems })
        }
    }

    fn error(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            path,
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            path,
            message: message.into(),
        });
    }
}

/// Check a fully layered config.
#[must_use]
pub fn validate(config: &SheetbotConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let token = config.telegram.token.expose_secret();
    if token.trim().is_empty() {
        result.error("telegram.token", "bot token is required (TELEGRAM_TOKEN)");
    } else if token.contains("${") {
        result.error("telegram.token", "unresolved environment placeholder");
    }

    if config.telegram.webhook_path.is_some() {
        let path = config.telegram.resolved_webhook_path();
        if path.contains(['{', '}', '*']) {
            result.error("telegram.webhook_path", "must be a literal path without wildcards");
        } else if matches!(path.as_str(), "/" | "/health" | "/metrics") {
            result.error("telegram.webhook_path", format!("'{path}' is reserved"));
        }
    }

    check_http_url(&mut result, "backend.url", &config.backend.url, true);

    for (path, secs) in [
        ("backend.read_timeout_secs", config.backend.read_timeout_secs),
        ("backend.write_timeout_secs", config.backend.write_timeout_secs),
        ("backend.bulk_timeout_secs", config.backend.bulk_timeout_secs),
    ] {
        if secs == 0 {
            result.error(path, "timeout must be at least one second");
        }
    }

    // Empty allowlist means "deny all"; treat it as a misconfiguration.
    if config.access.allowlist.iter().all(|e| e.trim().is_empty()) {
        result.error(
            "access.allowlist",
            "allowlist is empty (ADMIN_IDS); refusing to start a bot that denies everyone",
        );
    }
    for entry in config.access.allowlist.iter().map(|e| e.trim()) {
        if !entry.is_empty() && !is_user_id(entry) {
            result.error(
                "access.allowlist",
                format!("'{entry}' is not a numeric Telegram user id; usernames and wildcards are not accepted"),
            );
        }
    }

    if let Some(key) = config.resources.default_key.as_deref() {
        if !config.resources.entries.contains_key(key) {
            result.error(
                "resources.default_key",
                format!("default resource '{key}' is not listed in resources.entries"),
            );
        }
    } else if !config.resources.entries.is_empty() {
        result.warning(
            "resources.default_key",
            "no default resource; users must pick a file before backend commands",
        );
    }

    for (key, id) in &config.resources.entries {
        if key.trim().is_empty() || id.trim().is_empty() {
            result.error("resources.entries", "resource keys and ids must be non-empty");
            break;
        }
    }

    match config.server.public_url.as_deref() {
        Some(url) => check_http_url(&mut result, "server.public_url", url, false),
        None => result.warning(
            "server.public_url",
            "no public URL; the webhook will not be registered automatically",
        ),
    }

    if config.ingress.per_user_queue == 0 {
        result.error("ingress.per_user_queue", "must be greater than zero");
    }
    if config.ingress.max_in_flight == 0 {
        result.error("ingress.max_in_flight", "must be greater than zero");
    }

    result
}

fn is_user_id(entry: &str) -> bool {
    entry.bytes().all(|b| b.is_ascii_digit()) && entry.parse::<u64>().is_ok_and(|id| id > 0)
}

fn check_http_url(result: &mut ValidationResult, path: &'static str, raw: &str, required: bool) {
    if raw.trim().is_empty() {
        if required {
            result.error(path, "URL is required");
        }
        return;
    }
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {},
        Ok(url) => result.error(path, format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => result.error(path, format!("not a valid URL: {e}")),
    }
}
