use std::sync::Arc;

use {
    sheetbot_backend::{Backend, BackendResponse, Operation},
    sheetbot_common::UserId,
    sheetbot_sessions::{SessionStore, UserSession},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::{counter, labels, router as router_metrics};

use crate::{
    access::AccessList,
    command::classify,
    machine::{Action, ConversationState, transition},
    reply::{self, Outcome, Reply},
    resources::ResourceRegistry,
};

/// One text message, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user: UserId,
    pub username: Option<String>,
    pub text: String,
}

impl Inbound {
    pub fn new(user: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            username: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Turns inbound text into backend calls and replies.
///
/// Callers must not run two `handle` calls for the same user at once; the
/// ingress bridge guarantees this with one worker per user.
pub struct CommandRouter {
    access: AccessList,
    registry: ResourceRegistry,
    sessions: Arc<dyn SessionStore>,
    backend: Arc<dyn Backend>,
}

impl CommandRouter {
    pub fn new(
        access: AccessList,
        registry: ResourceRegistry,
        sessions: Arc<dyn SessionStore>,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            access,
            registry,
            sessions,
            backend,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Label rows of the main keyboard.
    pub fn menu(&self) -> Vec<Vec<String>> {
        reply::main_menu(&self.registry)
    }

    /// Route one message. Never fails: every error becomes a reply.
    pub async fn handle(&self, inbound: &Inbound) -> Outcome {
        if let Err(denied) = self.access.authorize(&inbound.user) {
            warn!(user_id = %denied.user_id, username = ?inbound.username, "access denied");
            #[cfg(feature = "metrics")]
            counter!(router_metrics::ACCESS_DENIALS_TOTAL).increment(1);
            return Outcome::Reply(Reply::plain(reply::ACCESS_DENIED));
        }

        let mut session = self.sessions.get(&inbound.user);
        let state = ConversationState::of(&session);
        let command = classify(&inbound.text, state.pending_input());
        debug!(user_id = %inbound.user, ?state, command = command.name(), "classified message");

        #[cfg(feature = "metrics")]
        counter!(router_metrics::COMMANDS_TOTAL, labels::COMMAND => command.name()).increment(1);

        let step = transition(state, command);

        // Commit the cleared state before any suspension point.
        if session.pending_input != step.next.pending_input() {
            session.pending_input = step.next.pending_input();
            self.sessions.set(&inbound.user, session.clone());
        }

        let (outcome, succeeded) = self.perform(&inbound.user, &mut session, step.action).await;

        if let Some(armed) = step.on_success.filter(|_| succeeded) {
            session.pending_input = armed.pending_input();
            self.sessions.set(&inbound.user, session);
        }

        outcome
    }

    async fn perform(
        &self,
        user: &UserId,
        session: &mut UserSession,
        action: Action,
    ) -> (Outcome, bool) {
        let reply = match action {
            Action::Greet => Reply::main(reply::GREETING),
            Action::Fallback => Reply::main(reply::FALLBACK),
            Action::RejectDate => Reply::main(reply::DATE_FORMAT_ERROR),
            Action::Restart => {
                info!(user_id = %user, "restart requested");
                #[cfg(feature = "metrics")]
                counter!(router_metrics::RESTARTS_TOTAL).increment(1);
                return (Outcome::Restart(Reply::plain(reply::RESTARTING)), true);
            },
            Action::Select(key) => match self.registry.lookup(&key) {
                Some(resource) => {
                    info!(user_id = %user, key = %key, resource = %resource, "resource selected");
                    session.selected_resource = Some(resource.clone());
                    self.sessions.set(user, session.clone());
                    Reply::main(reply::resource_selected(&key))
                },
                None => Reply::main(reply::unknown_resource(&key, &self.registry)),
            },
            Action::FetchDate => {
                return match self.call(session, Operation::GetDate).await {
                    Ok(BackendResponse::Date(date)) => (
                        Outcome::Reply(Reply::remove_menu(reply::date_prompt(&date))),
                        true,
                    ),
                    Ok(_) => (Outcome::Reply(Reply::main(reply::BACKEND_MALFORMED)), false),
                    Err(reply) => (Outcome::Reply(reply), false),
                };
            },
            Action::SubmitDate(date) => {
                match self.call(session, Operation::SetDate(date.clone())).await {
                    Ok(_) => {
                        info!(user_id = %user, date = %date, "date updated");
                        Reply::main(reply::date_set(&date))
                    },
                    Err(reply) => reply,
                }
            },
            Action::UpdateIntervals => match self.call(session, Operation::UpdateIntervals).await {
                Ok(_) => Reply::main(reply::INTERVALS_UPDATED),
                Err(reply) => reply,
            },
            Action::FetchStatus => match self.call(session, Operation::GetStatus).await {
                Ok(BackendResponse::Status(report)) => Reply::main(reply::status_report(&report)),
                Ok(_) => Reply::main(reply::BACKEND_MALFORMED),
                Err(reply) => reply,
            },
            Action::Clear => match self.call(session, Operation::Clear).await {
                Ok(BackendResponse::Done {
                    message: Some(message),
                }) => Reply::main(message),
                Ok(_) => Reply::main(reply::CLEARED),
                Err(reply) => reply,
            },
        };
        (Outcome::Reply(reply), true)
    }

    /// Resolve the target resource and call the backend. Errors come back as
    /// ready-to-send replies.
    async fn call(
        &self,
        session: &UserSession,
        operation: Operation,
    ) -> Result<BackendResponse, Reply> {
        let resource = self
            .registry
            .resolve(session.selected_resource.as_ref())
            .map_err(|_| Reply::main(reply::SELECT_FIRST))?;
        self.backend
            .call(&operation, resource.as_ref())
            .await
            .map_err(|err| Reply::main(reply::backend_error(&err)))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::reply::ReplyMenu,
        async_trait::async_trait,
        sheetbot_backend::{BackendError, StatusReport},
        sheetbot_common::ResourceId,
        sheetbot_sessions::{MemorySessionStore, PendingInput},
        std::{collections::VecDeque, sync::Mutex},
    };

    type Call = (Operation, Option<ResourceId>);

    /// Records calls and answers from a script; unscripted calls succeed.
    #[derive(Default)]
    struct MockBackend {
        calls: Mutex<Vec<Call>>,
        script: Mutex<VecDeque<sheetbot_backend::Result<BackendResponse>>>,
    }

    impl MockBackend {
        fn answering(responses: Vec<sheetbot_backend::Result<BackendResponse>>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::default(),
                script: Mutex::new(responses.into()),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn call(
            &self,
            operation: &Operation,
            resource: Option<&ResourceId>,
        ) -> sheetbot_backend::Result<BackendResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((operation.clone(), resource.cloned()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(BackendResponse::Done { message: None }))
        }
    }

    struct Fixture {
        router: CommandRouter,
        sessions: Arc<MemorySessionStore>,
        backend: Arc<MockBackend>,
    }

    fn fixture(registry: ResourceRegistry, backend: Arc<MockBackend>) -> Fixture {
        let sessions = Arc::new(MemorySessionStore::new());
        let router = CommandRouter::new(
            AccessList::new(["42"]).unwrap(),
            registry,
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::clone(&backend) as Arc<dyn Backend>,
        );
        Fixture {
            router,
            sessions,
            backend,
        }
    }

    fn files() -> ResourceRegistry {
        ResourceRegistry::new(
            ["2", "3"].map(|k| (k.to_string(), ResourceId::new(format!("sheet-{k}")))),
            None,
        )
    }

    fn text(outcome: &Outcome) -> &str {
        &outcome.reply().text
    }

    #[tokio::test]
    async fn unauthorized_user_gets_denial_and_nothing_else() {
        let f = fixture(ResourceRegistry::default(), MockBackend::answering(vec![]));
        for message in ["Старт", "Дата", "05.03.2031", "Рестарт", "hello"] {
            let outcome = f.router.handle(&Inbound::new("99", message)).await;
            assert_eq!(outcome, Outcome::Reply(Reply::plain(reply::ACCESS_DENIED)));
        }
        assert!(f.backend.calls().is_empty());
        assert!(f.sessions.is_empty());
    }

    #[tokio::test]
    async fn denied_user_with_stale_prompt_is_not_forwarded() {
        let f = fixture(ResourceRegistry::default(), MockBackend::answering(vec![]));
        f.sessions.set(&UserId::new("99"), UserSession {
            pending_input: Some(PendingInput::AwaitingDate),
            ..Default::default()
        });
        f.router.handle(&Inbound::new("99", "05.03.2031")).await;
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn username_alone_grants_nothing() {
        let f = fixture(ResourceRegistry::default(), MockBackend::answering(vec![]));
        let outcome = f
            .router
            .handle(&Inbound::new("7", "Старт").with_username("admin"))
            .await;
        assert_eq!(outcome, Outcome::Reply(Reply::plain(reply::ACCESS_DENIED)));
    }

    #[tokio::test]
    async fn date_scenario_prompts_then_submits() {
        let f = fixture(
            ResourceRegistry::default(),
            MockBackend::answering(vec![
                Ok(BackendResponse::Date("01.02.2030".into())),
                Ok(BackendResponse::Done { message: None }),
            ]),
        );
        let user = UserId::new("42");

        let outcome = f.router.handle(&Inbound::new("42", "Дата")).await;
        assert!(text(&outcome).contains("01.02.2030"));
        assert_eq!(outcome.reply().menu, ReplyMenu::Remove);
        assert_eq!(f.sessions.get(&user).pending_input, Some(PendingInput::AwaitingDate));

        let outcome = f.router.handle(&Inbound::new("42", "05.03.2031")).await;
        assert_eq!(text(&outcome), "Новая дата 05.03.2031 установлена");
        assert_eq!(f.sessions.get(&user).pending_input, None);

        assert_eq!(f.backend.calls(), vec![
            (Operation::GetDate, None),
            (Operation::SetDate("05.03.2031".into()), None),
        ]);
    }

    #[tokio::test]
    async fn failed_date_fetch_does_not_arm_prompt() {
        let f = fixture(
            ResourceRegistry::default(),
            MockBackend::answering(vec![Err(BackendError::timeout("read timed out"))]),
        );
        let outcome = f.router.handle(&Inbound::new("42", "Дата")).await;
        assert_eq!(text(&outcome), reply::BACKEND_TIMEOUT);
        assert_eq!(f.sessions.get(&UserId::new("42")).pending_input, None);
    }

    #[tokio::test]
    async fn date_submit_failure_still_returns_to_idle() {
        let f = fixture(
            ResourceRegistry::default(),
            MockBackend::answering(vec![Err(BackendError::application("Лист защищён"))]),
        );
        let user = UserId::new("42");
        f.sessions.set(&user, UserSession {
            pending_input: Some(PendingInput::AwaitingDate),
            ..Default::default()
        });

        let outcome = f.router.handle(&Inbound::new("42", "05.03.2031")).await;
        assert!(text(&outcome).contains("Лист защищён"));
        assert_eq!(f.backend.calls().len(), 1);
        assert_eq!(f.sessions.get(&user).pending_input, None);
    }

    #[tokio::test]
    async fn invalid_date_makes_no_call_and_resets() {
        let f = fixture(ResourceRegistry::default(), MockBackend::answering(vec![]));
        let user = UserId::new("42");
        for answer in ["5.3.2031", "завтра", "Статус", "05.03.２０３１", "0٥.0٣.٢٠٣١"] {
            f.sessions.set(&user, UserSession {
                pending_input: Some(PendingInput::AwaitingDate),
                ..Default::default()
            });
            let outcome = f.router.handle(&Inbound::new("42", answer)).await;
            assert_eq!(text(&outcome), reply::DATE_FORMAT_ERROR);
            assert_eq!(f.sessions.get(&user).pending_input, None);
        }
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn bare_date_outside_prompt_is_fallback() {
        let f = fixture(ResourceRegistry::default(), MockBackend::answering(vec![]));
        let outcome = f.router.handle(&Inbound::new("42", "05.03.2031")).await;
        assert_eq!(text(&outcome), reply::FALLBACK);
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn select_resource_is_idempotent() {
        let f = fixture(files(), MockBackend::answering(vec![]));
        let user = UserId::new("42");

        f.router.handle(&Inbound::new("42", "Файл 3")).await;
        let once = f.sessions.get(&user);
        f.router.handle(&Inbound::new("42", "Файл 3")).await;
        let twice = f.sessions.get(&user);

        assert_eq!(once, twice);
        assert_eq!(twice.selected_resource, Some(ResourceId::new("sheet-3")));
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn selection_scopes_following_calls() {
        let f = fixture(
            files(),
            MockBackend::answering(vec![
                Ok(BackendResponse::Status(StatusReport::default())),
                Ok(BackendResponse::Date("01.02.2030".into())),
            ]),
        );
        f.router.handle(&Inbound::new("42", "Файл 2")).await;
        f.router.handle(&Inbound::new("42", "Статус")).await;
        f.router.handle(&Inbound::new("42", "Дата")).await;

        let resource = Some(ResourceId::new("sheet-2"));
        assert_eq!(f.backend.calls(), vec![
            (Operation::GetStatus, resource.clone()),
            (Operation::GetDate, resource),
        ]);
    }

    #[tokio::test]
    async fn unknown_resource_leaves_session_unchanged() {
        let f = fixture(files(), MockBackend::answering(vec![]));
        let user = UserId::new("42");
        f.router.handle(&Inbound::new("42", "Файл 2")).await;

        let outcome = f.router.handle(&Inbound::new("42", "Файл 9")).await;
        assert!(text(&outcome).contains("9"));
        assert_eq!(
            f.sessions.get(&user).selected_resource,
            Some(ResourceId::new("sheet-2"))
        );
    }

    #[tokio::test]
    async fn multi_tenant_without_selection_asks_to_select() {
        let f = fixture(files(), MockBackend::answering(vec![]));
        let outcome = f.router.handle(&Inbound::new("42", "Обновить Интервалы")).await;
        assert_eq!(text(&outcome), reply::SELECT_FIRST);
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn default_key_is_used_without_selection() {
        let registry = ResourceRegistry::new(
            ["2", "3"].map(|k| (k.to_string(), ResourceId::new(format!("sheet-{k}")))),
            Some("3".into()),
        );
        let f = fixture(registry, MockBackend::answering(vec![]));
        let outcome = f.router.handle(&Inbound::new("42", "Обновить Интервалы")).await;
        assert_eq!(text(&outcome), reply::INTERVALS_UPDATED);
        assert_eq!(f.backend.calls(), vec![(
            Operation::UpdateIntervals,
            Some(ResourceId::new("sheet-3"))
        )]);
    }

    #[tokio::test]
    async fn clear_uses_backend_message_when_present() {
        let f = fixture(
            ResourceRegistry::default(),
            MockBackend::answering(vec![Ok(BackendResponse::Done {
                message: Some("Очищено 12 строк".into()),
            })]),
        );
        let outcome = f.router.handle(&Inbound::new("42", "очистить")).await;
        assert_eq!(text(&outcome), "Очищено 12 строк");
    }

    #[tokio::test]
    async fn transport_errors_become_replies() {
        let f = fixture(
            ResourceRegistry::default(),
            MockBackend::answering(vec![Err(BackendError::transport("connection refused"))]),
        );
        let outcome = f.router.handle(&Inbound::new("42", "Статус")).await;
        assert_eq!(
            text(&outcome),
            "Ошибка соединения с таблицей: connection refused"
        );
        assert!(!outcome.is_restart());
    }

    #[tokio::test]
    async fn restart_is_a_distinct_outcome() {
        let f = fixture(ResourceRegistry::default(), MockBackend::answering(vec![]));
        let outcome = f.router.handle(&Inbound::new("42", "Рестарт")).await;
        assert_eq!(outcome, Outcome::Restart(Reply::plain(reply::RESTARTING)));
        assert!(f.backend.calls().is_empty());
    }

    #[test]
    fn menu_reflects_registry() {
        let f = fixture(files(), MockBackend::answering(vec![]));
        assert!(f.router.menu().iter().flatten().any(|l| l == "Файл 3"));
    }
}
