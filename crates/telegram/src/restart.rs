use tokio_util::sync::CancellationToken;

/// Intentional-termination request raised by the restart command.
///
/// Kept apart from error exits: the binary waits on [`RestartSignal::requested`]
/// and exits with its restart code so the process supervisor starts a fresh
/// instance.
#[derive(Debug, Clone, Default)]
pub struct RestartSignal {
    token: CancellationToken,
}

impl RestartSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a restart was requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}
