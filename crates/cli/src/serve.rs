use std::sync::Arc;

use {
    anyhow::Context,
    sheetbot_backend::{Backend, HttpBackend},
    sheetbot_config::SheetbotConfig,
    sheetbot_gateway::{GatewayState, build_app, start_server},
    sheetbot_routing::{AccessList, CommandRouter, ResourceRegistry},
    sheetbot_sessions::{MemorySessionStore, SessionStore},
    sheetbot_telegram::{
        IngressBridge, IngressSettings, RestartSignal, TelegramHandler, TelegramOutbound, bot,
    },
    tracing::{info, warn},
};

/// How the server loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Ctrl-C / SIGTERM.
    Stopped,
    /// A user pressed the restart button.
    RestartRequested,
}

pub async fn run(config: SheetbotConfig) -> anyhow::Result<Exit> {
    #[cfg(feature = "metrics")]
    let metrics_handle = sheetbot_metrics::init_metrics(sheetbot_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        ..Default::default()
    })?;

    let access = AccessList::new(&config.access.allowlist).context("access.allowlist")?;
    let registry = ResourceRegistry::from_config(&config.resources);
    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::from_config(&config.backend)?);
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    info!(
        allowed = access.len(),
        resources = registry.keys().count(),
        "router configured"
    );

    let router = Arc::new(CommandRouter::new(access, registry, sessions, backend));
    let bot = bot::build_bot(&config.telegram.token, None)?;
    let outbound = Arc::new(TelegramOutbound::new(bot.clone(), router.menu()));
    let restart = RestartSignal::new();
    let handler = Arc::new(TelegramHandler::new(router, outbound, restart.clone()));
    let bridge = IngressBridge::new(handler, IngressSettings::from(&config.ingress));

    let webhook_path = config.telegram.resolved_webhook_path();
    match config.server.public_url.as_deref() {
        Some(public_url) => {
            let url = bot::webhook_url(public_url, &webhook_path)?;
            bot::register_webhook(&bot, url, config.telegram.webhook_secret.as_ref()).await?;
        },
        None => warn!("server.public_url not set; assuming the webhook is registered elsewhere"),
    }

    let state = GatewayState::new(bridge.clone(), webhook_path)
        .with_webhook_secret(config.telegram.webhook_secret.clone());
    #[cfg(feature = "metrics")]
    let state = state.with_metrics(metrics_handle);
    let app = build_app(Arc::new(state));

    let shutdown = {
        let restart = restart.clone();
        async move {
            tokio::select! {
                () = restart.requested() => {},
                () = shutdown_signal() => info!("shutdown signal received"),
            }
        }
    };
    start_server(&config.server.bind, config.server.port, app, shutdown).await?;
    bridge.shutdown();

    Ok(if restart.is_requested() {
        Exit::RestartRequested
    } else {
        Exit::Stopped
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
