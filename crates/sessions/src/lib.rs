//! Per-user conversation state.
//!
//! Sessions live in process memory only. Losing them on restart degrades to
//! the bot asking again, so there is no persistence layer.

pub mod session;
pub mod store;

pub use {
    session::{PendingInput, UserSession},
    store::{MemorySessionStore, SessionStore},
};
