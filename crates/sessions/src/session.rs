use {
    serde::{Deserialize, Serialize},
    sheetbot_common::ResourceId,
};

/// What the next free-text message from a user answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingInput {
    /// The bot showed the current date and asked for a new one.
    AwaitingDate,
}

/// Conversation state for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    /// Resource the user picked with a "file" button, if any.
    pub selected_resource: Option<ResourceId>,
    /// Set while the bot waits for an answer to a prompt.
    pub pending_input: Option<PendingInput>,
}

impl UserSession {
    #[must_use]
    pub fn is_awaiting(&self, input: PendingInput) -> bool {
        self.pending_input == Some(input)
    }
}
