//! Identifier types shared by every sheetbot crate.

pub mod types;

pub use types::{ChatId, ResourceId, UserId};
