//! HTTP front door: health checks, the Telegram webhook, and (with the
//! `prometheus` feature) the metrics scrape endpoint.
//!
//! The webhook handler only decodes the update and hands it to the
//! [`IngressBridge`](sheetbot_telegram::IngressBridge); it never waits for
//! command processing.

#[cfg(feature = "prometheus")]
pub mod metrics_routes;
pub mod server;
pub mod state;

pub use {
    server::{HEALTH_BODY, SECRET_TOKEN_HEADER, build_app, start_server},
    state::GatewayState,
};
