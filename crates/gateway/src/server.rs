use std::{future::Future, net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        body::{Body, Bytes},
        extract::State,
        http::{HeaderMap, Request, StatusCode, header},
        response::{IntoResponse, Response},
        routing::{get, post},
    },
    sheetbot_telegram::{Error as IngressError, parse_update},
    tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer},
    tracing::{Span, error, info, info_span, warn},
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::{counter, ingress as ingress_metrics, labels};

use crate::state::GatewayState;

/// Body of the health endpoints.
pub const HEALTH_BODY: &str = "Bot is running!";

/// Header Telegram uses to echo the webhook secret.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Build the HTTP router (shared between production startup and tests).
pub fn build_app(state: Arc<GatewayState>) -> Router {
    let webhook_path: Arc<str> = Arc::from(state.webhook_path.as_str());
    let router = Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route(&state.webhook_path, post(webhook_handler));

    #[cfg(feature = "prometheus")]
    let router = router.route(
        "/metrics",
        get(crate::metrics_routes::prometheus_metrics_handler),
    );

    router
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(move |request: &Request<Body>| request_span(&webhook_path, request)),
        )
        .with_state(state)
}

/// Serve `app` on `bind:port` until `shutdown` resolves.
pub async fn start_server(
    bind: &str,
    port: u16,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Request span that never records the URI: the default webhook path carries
/// the bot token.
fn request_span<B>(webhook_path: &str, request: &Request<B>) -> Span {
    let path = request.uri().path();
    let route = if path == webhook_path {
        "webhook"
    } else {
        match path {
            "/" => "/",
            "/health" => "/health",
            "/metrics" => "/metrics",
            _ => "other",
        }
    };
    info_span!("request", method = %request.method(), route)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler() -> &'static str {
    HEALTH_BODY
}

/// Acknowledge fast; the bridge does the work. Only saturation makes Telegram
/// retry: undecodable bodies are acknowledged so they are not redelivered
/// forever.
async fn webhook_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let provided = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if !state.secret_matches(provided) {
        warn!("webhook delivery with wrong secret token");
        #[cfg(feature = "metrics")]
        counter!(ingress_metrics::UPDATES_REJECTED_TOTAL, labels::REASON => "bad_secret")
            .increment(1);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let message = match parse_update(&body) {
        Ok(Some(message)) => message,
        Ok(None) => return StatusCode::OK.into_response(),
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "undecodable webhook body");
            #[cfg(feature = "metrics")]
            counter!(ingress_metrics::UPDATES_IGNORED_TOTAL, labels::REASON => "malformed")
                .increment(1);
            return StatusCode::OK.into_response();
        },
    };

    match state.bridge.deliver(message) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e @ (IngressError::Saturated { .. } | IngressError::ShuttingDown)) => {
            warn!(error = %e, "deferring webhook delivery");
            (StatusCode::SERVICE_UNAVAILABLE, [(header::RETRY_AFTER, "1")]).into_response()
        },
        Err(e) => {
            error!(error = %e, "failed to queue update");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}
