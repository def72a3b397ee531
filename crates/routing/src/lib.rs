//! Command routing for the sheet bot.
//!
//! A message flows through [`AccessList::authorize`], then a pure
//! classification step ([`classify`]) and a pure state transition
//! ([`transition`]), before [`CommandRouter`] runs the resulting action against
//! the backend and picks a [`Reply`].

pub mod access;
pub mod command;
pub mod machine;
pub mod reply;
pub mod resources;
pub mod router;

pub use {
    access::{AccessDenied, AccessList, AccessListError},
    command::{Command, classify},
    machine::{Action, ConversationState, Transition, transition},
    reply::{Outcome, Reply, ReplyMenu},
    resources::{ResourceRegistry, SelectionRequired},
    router::{CommandRouter, Inbound},
};
