//! Metrics collection and export for sheetbot.
//!
//! Crates record through the `metrics` facade macros re-exported here. When the
//! `prometheus` feature is enabled, [`init_metrics`] installs a recorder whose
//! handle renders the text exposition format for the `/metrics` route.
//!
//! ```rust,ignore
//! use sheetbot_metrics::{backend, counter};
//!
//! counter!(backend::CALLS_TOTAL, "operation" => "get_date").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
