use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::SheetbotConfig,
    validate::validate,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "sheetbot.toml",
    "sheetbot.yaml",
    "sheetbot.yml",
    "sheetbot.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SheetbotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Build the effective configuration: defaults, then the config file (the
/// explicit one, or the first discovered), then environment overrides.
///
/// A missing config file is fine; deployments often configure purely through
/// the environment.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<SheetbotConfig> {
    let mut config = match explicit.map(Path::to_path_buf).or_else(find_config_file) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using environment only");
            SheetbotConfig::default()
        },
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// [`discover_and_load`] followed by validation. Warnings are logged, errors
/// are returned.
pub fn load_validated(explicit: Option<&Path>) -> Result<SheetbotConfig> {
    let config = discover_and_load(explicit)?;
    let result = validate(&config);
    for diagnostic in result.warnings() {
        warn!(path = diagnostic.path, "{}", diagnostic.message);
    }
    result.into_result()?;
    Ok(config)
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/sheetbot/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "sheetbot").map(|d| d.config_dir().to_path_buf())
}

/// Apply the deployment environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut SheetbotConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    config: &mut SheetbotConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(token) = var("TELEGRAM_TOKEN") {
        config.telegram.token = Secret::new(token);
    }
    if let Some(secret) = var("TELEGRAM_WEBHOOK_SECRET") {
        config.telegram.webhook_secret = Some(Secret::new(secret));
    }
    if let Some(url) = var("GAS_WEB_APP_URL") {
        config.backend.url = url;
    }
    if let Some(ids) = var("ADMIN_IDS") {
        config.access.allowlist = split_list(&ids).map(str::to_string).collect();
    }
    if let Some(resources) = var("RESOURCES") {
        config.resources.entries.clear();
        for pair in split_list(&resources) {
            let (key, id) = pair
                .split_once('=')
                .ok_or_else(|| Error::invalid_env("RESOURCES", format!("expected key=id, got '{pair}'")))?;
            config
                .resources
                .entries
                .insert(key.trim().to_string(), id.trim().to_string());
        }
    }
    if let Some(key) = var("DEFAULT_RESOURCE") {
        config.resources.default_key = Some(key);
    }
    if let Some(url) = var("PUBLIC_URL") {
        config.server.public_url = Some(url.trim_end_matches('/').to_string());
    } else if let Some(host) = var("RENDER_EXTERNAL_HOSTNAME") {
        config.server.public_url = Some(format!("https://{host}"));
    }
    if let Some(port) = var("PORT") {
        config.server.port = port
            .parse()
            .map_err(|e| Error::invalid_env("PORT", format!("'{port}': {e}")))?;
    }
    if let Some(bind) = var("BIND") {
        config.server.bind = bind;
    }

    Ok(())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split([',', ';', ' ', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_config(raw: &str, path: &Path) -> Result<SheetbotConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}
