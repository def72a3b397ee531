//! Proxy client for the remote spreadsheet automation endpoint.
//!
//! Every call is scoped to an optional resource id, bounded by a per-operation
//! timeout, and normalised into either a typed [`BackendResponse`] or a
//! [`BackendError`] with a coarse [`BackendErrorKind`].

pub mod client;
pub mod error;
pub mod operation;

pub use {
    client::{Backend, BackendTimeouts, HttpBackend},
    error::{BackendError, BackendErrorKind, Result},
    operation::{BackendResponse, Operation, OperationWeight, StatusReport},
};
