use std::fmt;

/// Coarse failure category, used to pick the user-facing explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The call did not finish within its timeout.
    Timeout,
    /// Connection, DNS, TLS, or HTTP-level failure.
    Transport,
    /// Body was not JSON or lacked an expected field.
    MalformedResponse,
    /// The backend answered with an explicit error status.
    ApplicationError,
}

impl BackendErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
            Self::ApplicationError => "application_error",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed backend call.
///
/// `message` is a short diagnostic. For [`BackendErrorKind::ApplicationError`]
/// it is the backend's own message and is safe to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Timeout, message)
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transport, message)
    }

    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::MalformedResponse, message)
    }

    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ApplicationError, message)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL can carry the deployment id; keep it out of messages.
        let err = err.without_url();
        let kind = if err.is_timeout() {
            BackendErrorKind::Timeout
        } else if err.is_decode() {
            BackendErrorKind::MalformedResponse
        } else {
            BackendErrorKind::Transport
        };
        Self::new(kind, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
