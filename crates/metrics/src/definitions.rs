//! Metric name and label definitions.
//!
//! Every metric sheetbot emits is named here so the exported set is easy to
//! audit.

/// Webhook ingress metrics
pub mod ingress {
    /// Updates accepted for processing
    pub const UPDATES_ACCEPTED_TOTAL: &str = "sheetbot_ingress_updates_accepted_total";
    /// Updates refused because a queue was full (labelled by `reason`)
    pub const UPDATES_REJECTED_TOTAL: &str = "sheetbot_ingress_updates_rejected_total";
    /// Updates acknowledged without processing (no text, unparseable)
    pub const UPDATES_IGNORED_TOTAL: &str = "sheetbot_ingress_updates_ignored_total";
    /// Number of live per-user workers
    pub const ACTIVE_WORKERS: &str = "sheetbot_ingress_active_workers";
    /// Time from acceptance to the end of processing, in seconds
    pub const PROCESSING_DURATION_SECONDS: &str = "sheetbot_ingress_processing_duration_seconds";
}

/// Command routing metrics
pub mod router {
    /// Commands handled (labelled by `command`)
    pub const COMMANDS_TOTAL: &str = "sheetbot_router_commands_total";
    /// Messages from users not on the allowlist
    pub const ACCESS_DENIALS_TOTAL: &str = "sheetbot_router_access_denials_total";
    /// Restart requests accepted
    pub const RESTARTS_TOTAL: &str = "sheetbot_router_restarts_total";
}

/// Backend proxy metrics
pub mod backend {
    /// Calls to the automation endpoint (labelled by `operation` and `outcome`)
    pub const CALLS_TOTAL: &str = "sheetbot_backend_calls_total";
    /// Call duration in seconds (labelled by `operation`)
    pub const CALL_DURATION_SECONDS: &str = "sheetbot_backend_call_duration_seconds";
}

/// Telegram metrics
pub mod telegram {
    /// Replies sent to Telegram
    pub const MESSAGES_SENT_TOTAL: &str = "sheetbot_telegram_messages_sent_total";
    /// Reply send errors
    pub const MESSAGE_SEND_ERRORS_TOTAL: &str = "sheetbot_telegram_message_send_errors_total";
}

/// Common label keys
pub mod labels {
    pub const COMMAND: &str = "command";
    pub const OPERATION: &str = "operation";
    pub const OUTCOME: &str = "outcome";
    pub const REASON: &str = "reason";
}

/// Histogram buckets
pub mod buckets {
    /// Backend call duration buckets (in seconds). Covers 50ms to the 30s
    /// bulk-update timeout.
    pub const BACKEND_DURATION: &[f64] = &[
        0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0,
    ];
}
