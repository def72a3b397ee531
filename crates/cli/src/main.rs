mod config_commands;
mod serve;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Exit code used for the user-requested restart. The process supervisor
/// restarts the bot on any exit; `0` keeps restarts out of crash statistics.
pub const RESTART_EXIT_CODE: i32 = 0;

#[derive(Parser)]
#[command(name = "sheetbot", about = "Sheetbot: Telegram front end for a spreadsheet automation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./sheetbot.toml and friends).
    #[arg(long, global = true, env = "SHEETBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the webhook server (default when no subcommand is provided).
    Serve,
    /// Load and validate configuration, then print a redacted summary.
    CheckConfig,
    /// Register the Telegram webhook and exit.
    SetWebhook,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "sheetbot starting");

    match cli.command {
        None | Some(Commands::Serve) => {
            let mut config = sheetbot_config::load_validated(cli.config.as_deref())?;
            if let Some(bind) = cli.bind {
                config.server.bind = bind;
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }

            match serve::run(config).await? {
                serve::Exit::Stopped => {
                    info!("sheetbot stopped");
                    Ok(())
                },
                serve::Exit::RestartRequested => {
                    warn!(
                        exit_code = RESTART_EXIT_CODE,
                        "restart requested, exiting for the supervisor"
                    );
                    std::process::exit(RESTART_EXIT_CODE);
                },
            }
        },
        Some(Commands::CheckConfig) => config_commands::check_config(cli.config.as_deref()),
        Some(Commands::SetWebhook) => config_commands::set_webhook(cli.config.as_deref()).await,
    }
}
