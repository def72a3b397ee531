use {
    dashmap::DashMap,
    sheetbot_common::UserId,
    tracing::trace,
};

use crate::session::UserSession;

/// Keyed access to user sessions.
///
/// Callers serialize work per user (the ingress bridge runs one worker per
/// user), so `get` followed by `set` is not racy for a given key. Different
/// keys never contend with each other.
pub trait SessionStore: Send + Sync {
    /// Current session for `user`, or a fresh default one. Never fails.
    fn get(&self, user: &UserId) -> UserSession;

    /// Replace the session for `user`.
    fn set(&self, user: &UserId, session: UserSession);
}

/// Process-memory session store backed by a sharded map.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<UserId, UserSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a stored session.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, user: &UserId) -> UserSession {
        self.sessions
            .get(user)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn set(&self, user: &UserId, session: UserSession) {
        trace!(user_id = %user, ?session, "session updated");
        self.sessions.insert(user.clone(), session);
    }
}
