//! Prometheus scrape endpoint.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::GatewayState;

/// Metrics in Prometheus text exposition format. Unauthenticated so scrapers
/// can reach it.
pub async fn prometheus_metrics_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match state.metrics_handle.as_ref().filter(|h| h.is_enabled()) {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled",
        )
            .into_response(),
    }
}
