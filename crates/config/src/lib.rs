//! Configuration loading, environment overrides, and validation.
//!
//! Config files: `sheetbot.toml`, `sheetbot.yaml`, or `sheetbot.json`
//! Searched in `./` then `~/.config/sheetbot/`. Deployment environment
//! variables (`TELEGRAM_TOKEN`, `GAS_WEB_APP_URL`, `ADMIN_IDS`, ...) are
//! applied on top.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, load_validated},
    schema::{
        AccessConfig, BackendConfig, IngressConfig, MetricsConfig, ResourcesConfig, ServerConfig,
        SheetbotConfig, TelegramConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
