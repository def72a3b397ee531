//! Pure conversation state machine: `(state, command) -> (action, next state)`.

use sheetbot_sessions::{PendingInput, UserSession};

use crate::command::Command;

/// Where a user is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingDate,
}

impl ConversationState {
    #[must_use]
    pub fn of(session: &UserSession) -> Self {
        match session.pending_input {
            Some(PendingInput::AwaitingDate) => Self::AwaitingDate,
            None => Self::Idle,
        }
    }

    #[must_use]
    pub fn pending_input(self) -> Option<PendingInput> {
        match self {
            Self::Idle => None,
            Self::AwaitingDate => Some(PendingInput::AwaitingDate),
        }
    }
}

/// Side effect the router performs for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Greet,
    FetchDate,
    SubmitDate(String),
    UpdateIntervals,
    FetchStatus,
    Clear,
    Select(String),
    Restart,
    /// Free text while a date was expected.
    RejectDate,
    /// Free text outside any prompt.
    Fallback,
}

impl Action {
    /// Whether the action talks to the backend.
    #[must_use]
    pub fn calls_backend(&self) -> bool {
        matches!(
            self,
            Self::FetchDate
                | Self::SubmitDate(_)
                | Self::UpdateIntervals
                | Self::FetchStatus
                | Self::Clear
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    /// State committed before the action runs.
    pub next: ConversationState,
    /// State to switch to once the action succeeds, if different from `next`.
    pub on_success: Option<ConversationState>,
}

impl Transition {
    fn to_idle(action: Action) -> Self {
        Self {
            action,
            next: ConversationState::Idle,
            on_success: None,
        }
    }
}

/// Every path leaves the user idle, except a successful date fetch, which
/// arms the date prompt.
#[must_use]
pub fn transition(state: ConversationState, command: Command) -> Transition {
    match (state, command) {
        (ConversationState::AwaitingDate, Command::SubmitDate(date)) => {
            Transition::to_idle(Action::SubmitDate(date))
        },
        (ConversationState::AwaitingDate, _) => Transition::to_idle(Action::RejectDate),
        (ConversationState::Idle, command) => match command {
            Command::Start => Transition::to_idle(Action::Greet),
            Command::ShowDate => Transition {
                action: Action::FetchDate,
                next: ConversationState::Idle,
                on_success: Some(ConversationState::AwaitingDate),
            },
            Command::UpdateIntervals => Transition::to_idle(Action::UpdateIntervals),
            Command::ShowStatus => Transition::to_idle(Action::FetchStatus),
            Command::ClearResource => Transition::to_idle(Action::Clear),
            Command::SelectResource(key) => Transition::to_idle(Action::Select(key)),
            Command::Restart => Transition::to_idle(Action::Restart),
            // Dates are only meaningful after a prompt.
            Command::SubmitDate(_) | Command::Unknown(_) => Transition::to_idle(Action::Fallback),
        },
    }
}
