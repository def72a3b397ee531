use std::{fmt::Write as _, path::Path};

use {
    anyhow::{Result, bail},
    sheetbot_config::{Severity, SheetbotConfig, validate},
    sheetbot_telegram::bot,
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load the effective configuration, print every diagnostic and a summary
/// with secrets withheld. Fails when any diagnostic is an error.
pub fn check_config(explicit: Option<&Path>) -> Result<()> {
    let config = sheetbot_config::discover_and_load(explicit)?;
    let result = validate(&config);

    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = result
        .diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = result.warnings().count();
    if !result.diagnostics.is_empty() {
        eprintln!();
    }

    eprint!("{}", summary(&config));

    if errors > 0 {
        bail!("{errors} error(s), {warnings} warning(s)");
    }
    if warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{warnings} warning(s)");
    }
    Ok(())
}

/// Register the webhook at `server.public_url` and exit.
pub async fn set_webhook(explicit: Option<&Path>) -> Result<()> {
    let config = sheetbot_config::load_validated(explicit)?;
    let Some(public_url) = config.server.public_url.as_deref() else {
        bail!("server.public_url (PUBLIC_URL) is required to register the webhook");
    };

    let bot = bot::build_bot(&config.telegram.token, None)?;
    let url = bot::webhook_url(public_url, &config.telegram.resolved_webhook_path())?;
    bot::register_webhook(&bot, url, config.telegram.webhook_secret.as_ref()).await?;
    eprintln!("Webhook registered for {public_url}");
    Ok(())
}

/// Human-readable overview. The bot token, the webhook path derived from it,
/// and the backend URL path never appear.
fn summary(config: &SheetbotConfig) -> String {
    let mut out = String::new();
    let backend_host = url::Url::parse(&config.backend.url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "(unset)".into());

    let _ = writeln!(out, "backend:   {backend_host}");
    let _ = writeln!(
        out,
        "timeouts:  read {}s, write {}s, bulk {}s",
        config.backend.read_timeout_secs,
        config.backend.write_timeout_secs,
        config.backend.bulk_timeout_secs
    );
    let _ = writeln!(out, "allowlist: {} entr(ies)", config.access.allowlist.len());
    if config.resources.entries.is_empty() {
        let _ = writeln!(out, "resources: single backend target");
    } else {
        let keys: Vec<&str> = config.resources.entries.keys().map(String::as_str).collect();
        let _ = writeln!(
            out,
            "resources: {} (default: {})",
            keys.join(", "),
            config.resources.default_key.as_deref().unwrap_or("none")
        );
    }
    let _ = writeln!(
        out,
        "server:    {}:{} (public: {})",
        config.server.bind,
        config.server.port,
        config.server.public_url.as_deref().unwrap_or("not set")
    );
    let _ = writeln!(
        out,
        "webhook:   {} path, secret {}",
        if config.telegram.webhook_path.is_some() {
            "custom"
        } else {
            "token-derived"
        },
        if config.telegram.webhook_secret.is_some() {
            "set"
        } else {
            "not set"
        }
    );
    let _ = writeln!(
        out,
        "ingress:   queue {} per user, {} in flight",
        config.ingress.per_user_queue, config.ingress.max_in_flight
    );
    out
}
