use std::sync::Arc;

use {
    async_trait::async_trait,
    sheetbot_common::{ChatId, UserId},
    sheetbot_routing::{CommandRouter, Inbound},
    teloxide::types::{Update, UpdateKind},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::{counter, ingress as ingress_metrics, labels};

use crate::{
    ingress::{IncomingMessage, UpdateProcessor},
    outbound::ReplyChannel,
    restart::RestartSignal,
};

/// Decode a webhook body.
///
/// `Ok(None)` means a valid update that carries nothing to route (edited
/// message, sticker, message from a bot, ...).
pub fn parse_update(body: &[u8]) -> serde_json::Result<Option<IncomingMessage>> {
    let update: Update = serde_json::from_slice(body)?;
    let message = incoming_from_update(&update);
    if message.is_none() {
        debug!(update_id = update.id.0, "ignoring update without routable text");
        #[cfg(feature = "metrics")]
        counter!(ingress_metrics::UPDATES_IGNORED_TOTAL, labels::REASON => "no_text").increment(1);
    }
    Ok(message)
}

/// Text message from a human sender, if `update` is one.
pub fn incoming_from_update(update: &Update) -> Option<IncomingMessage> {
    let UpdateKind::Message(msg) = &update.kind else {
        return None;
    };
    let text = msg.text()?;
    let from = msg.from.as_ref().filter(|user| !user.is_bot)?;

    Some(IncomingMessage {
        chat: ChatId(msg.chat.id.0),
        inbound: Inbound {
            user: UserId::from(from.id.0),
            username: from.username.clone(),
            text: text.to_string(),
        },
    })
}

/// Routes one message and sends the reply. Raises the restart signal after
/// the acknowledgement went out.
pub struct TelegramHandler {
    router: Arc<CommandRouter>,
    outbound: Arc<dyn ReplyChannel>,
    restart: RestartSignal,
}

impl TelegramHandler {
    pub fn new(
        router: Arc<CommandRouter>,
        outbound: Arc<dyn ReplyChannel>,
        restart: RestartSignal,
    ) -> Self {
        Self {
            router,
            outbound,
            restart,
        }
    }
}

#[async_trait]
impl UpdateProcessor for TelegramHandler {
    async fn process(&self, message: IncomingMessage) {
        let outcome = self.router.handle(&message.inbound).await;

        if let Err(e) = self.outbound.send_reply(message.chat, outcome.reply()).await {
            warn!(
                chat_id = %message.chat,
                user_id = %message.inbound.user,
                error = %e,
                "failed to send reply"
            );
        }

        if outcome.is_restart() {
            info!(user_id = %message.inbound.user, "restart acknowledged, signalling shutdown");
            self.restart.request();
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            ingress::{IngressBridge, IngressSettings},
            outbound::TelegramOutbound,
        },
        axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
        serde::{Deserialize, Serialize},
        serde_json::{Value, json},
        sheetbot_backend::{Backend, BackendResponse, Operation},
        sheetbot_common::ResourceId,
        sheetbot_routing::{AccessList, ResourceRegistry},
        sheetbot_sessions::{MemorySessionStore, PendingInput, SessionStore},
        std::sync::Mutex,
        tokio::sync::oneshot,
    };

    #[derive(Debug, Clone, Deserialize)]
    struct SendMessageRequest {
        chat_id: i64,
        text: String,
        #[serde(default)]
        reply_markup: Option<Value>,
    }

    #[derive(Debug, Serialize)]
    struct TelegramApiResponse {
        ok: bool,
        result: Value,
    }

    #[derive(Clone, Default)]
    struct MockTelegramApi {
        sent: Arc<Mutex<Vec<SendMessageRequest>>>,
        methods: Arc<Mutex<Vec<String>>>,
    }

    async fn telegram_api_handler(
        State(state): State<MockTelegramApi>,
        uri: Uri,
        body: Bytes,
    ) -> Json<TelegramApiResponse> {
        let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
        state.methods.lock().unwrap().push(method.clone());

        if method.eq_ignore_ascii_case("SendMessage") {
            let req: SendMessageRequest = serde_json::from_slice(&body).unwrap();
            let chat_id = req.chat_id;
            state.sent.lock().unwrap().push(req);
            return Json(TelegramApiResponse {
                ok: true,
                result: json!({
                    "message_id": 1,
                    "date": 0,
                    "chat": { "id": chat_id, "type": "private", "first_name": "Test" },
                    "text": "ok"
                }),
            });
        }
        Json(TelegramApiResponse {
            ok: true,
            result: Value::Bool(true),
        })
    }

    struct MockApiServer {
        api: MockTelegramApi,
        bot: teloxide::Bot,
        shutdown: Option<oneshot::Sender<()>>,
    }

    impl Drop for MockApiServer {
        fn drop(&mut self) {
            if let Some(tx) = self.shutdown.take() {
                let _ = tx.send(());
            }
        }
    }

    async fn mock_api() -> MockApiServer {
        let api = MockTelegramApi::default();
        let app = Router::new()
            .route("/{*path}", post(telegram_api_handler))
            .with_state(api.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = url::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        let bot = teloxide::Bot::new("test-token").set_api_url(api_url);
        MockApiServer {
            api,
            bot,
            shutdown: Some(shutdown_tx),
        }
    }

    struct DateBackend;

    #[async_trait]
    impl Backend for DateBackend {
        async fn call(
            &self,
            operation: &Operation,
            _resource: Option<&ResourceId>,
        ) -> sheetbot_backend::Result<BackendResponse> {
            Ok(match operation {
                Operation::GetDate => BackendResponse::Date("01.02.2030".into()),
                _ => BackendResponse::Done { message: None },
            })
        }
    }

    fn handler(bot: teloxide::Bot, restart: RestartSignal) -> TelegramHandler {
        let router = Arc::new(CommandRouter::new(
            AccessList::new(["42"]).unwrap(),
            ResourceRegistry::default(),
            Arc::new(MemorySessionStore::new()) as Arc<dyn SessionStore>,
            Arc::new(DateBackend) as Arc<dyn Backend>,
        ));
        let outbound = Arc::new(TelegramOutbound::new(bot, router.menu()));
        TelegramHandler::new(router, outbound, restart)
    }

    fn text_update(user_id: u64, text: &str) -> Value {
        json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1,
                "chat": { "id": 500, "type": "private", "first_name": "Alice" },
                "from": {
                    "id": user_id,
                    "is_bot": false,
                    "first_name": "Alice",
                    "username": "alice"
                },
                "text": text
            }
        })
    }

    #[test]
    fn parses_text_message() {
        let body = serde_json::to_vec(&text_update(42, "Старт")).unwrap();
        let message = parse_update(&body).unwrap().expect("routable message");
        assert_eq!(message.chat, ChatId(500));
        assert_eq!(message.inbound.user, UserId::new("42"));
        assert_eq!(message.inbound.username.as_deref(), Some("alice"));
        assert_eq!(message.inbound.text, "Старт");
    }

    #[test]
    fn ignores_non_text_and_bot_messages() {
        let location = json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "date": 1,
                "chat": { "id": 500, "type": "private", "first_name": "Alice" },
                "from": { "id": 42, "is_bot": false, "first_name": "Alice" },
                "location": { "longitude": 37.6, "latitude": 55.7 }
            }
        });
        assert!(parse_update(&serde_json::to_vec(&location).unwrap()).unwrap().is_none());

        let mut from_bot = text_update(42, "Старт");
        from_bot["message"]["from"]["is_bot"] = json!(true);
        assert!(parse_update(&serde_json::to_vec(&from_bot).unwrap()).unwrap().is_none());
    }

    #[test]
    fn rejects_garbage_body() {
        assert!(parse_update(b"{not json").is_err());
    }

    #[tokio::test]
    async fn start_sends_greeting_with_keyboard() {
        let server = mock_api().await;
        let restart = RestartSignal::new();
        let handler = handler(server.bot.clone(), restart.clone());

        let body = serde_json::to_vec(&text_update(42, "Старт")).unwrap();
        handler
            .process(parse_update(&body).unwrap().unwrap())
            .await;

        let sent = server.api.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 500);
        assert_eq!(sent[0].text, "Добро пожаловать! Выбери действие:");
        let markup = sent[0].reply_markup.as_ref().expect("keyboard attached");
        assert_eq!(markup["resize_keyboard"], json!(true));
        assert_eq!(markup["keyboard"][0][0]["text"], json!("Старт"));
        assert!(!restart.is_requested());
    }

    #[tokio::test]
    async fn date_prompt_removes_keyboard() {
        let server = mock_api().await;
        let handler = handler(server.bot.clone(), RestartSignal::new());

        let body = serde_json::to_vec(&text_update(42, "Дата")).unwrap();
        handler
            .process(parse_update(&body).unwrap().unwrap())
            .await;

        let sent = server.api.sent.lock().unwrap().clone();
        assert!(sent[0].text.contains("01.02.2030"));
        let markup = sent[0].reply_markup.as_ref().expect("markup attached");
        assert_eq!(markup["remove_keyboard"], json!(true));
    }

    #[tokio::test]
    async fn denied_user_gets_plain_denial() {
        let server = mock_api().await;
        let handler = handler(server.bot.clone(), RestartSignal::new());

        let body = serde_json::to_vec(&text_update(99, "Старт")).unwrap();
        handler
            .process(parse_update(&body).unwrap().unwrap())
            .await;

        let sent = server.api.sent.lock().unwrap().clone();
        assert_eq!(sent[0].text, "Доступ запрещён.");
        assert!(sent[0].reply_markup.is_none());
    }

    #[tokio::test]
    async fn restart_replies_then_signals() {
        let server = mock_api().await;
        let restart = RestartSignal::new();
        let handler = handler(server.bot.clone(), restart.clone());

        let body = serde_json::to_vec(&text_update(42, "Рестарт")).unwrap();
        handler
            .process(parse_update(&body).unwrap().unwrap())
            .await;

        let sent = server.api.sent.lock().unwrap().clone();
        assert_eq!(sent[0].text, "Бот будет перезапущен...");
        assert!(restart.is_requested());
    }

    /// Records every call; the date read yields to the scheduler first so a
    /// second message for the same user would overtake it if allowed.
    #[derive(Default)]
    struct SlowBackend {
        calls: Mutex<Vec<Operation>>,
    }

    #[async_trait]
    impl Backend for SlowBackend {
        async fn call(
            &self,
            operation: &Operation,
            _resource: Option<&ResourceId>,
        ) -> sheetbot_backend::Result<BackendResponse> {
            self.calls.lock().unwrap().push(operation.clone());
            Ok(match operation {
                Operation::GetDate => {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    BackendResponse::Date("01.02.2030".into())
                },
                _ => BackendResponse::Done { message: None },
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_user_messages_through_the_bridge_keep_the_prompt_consistent() {
        let server = mock_api().await;
        let sessions = Arc::new(MemorySessionStore::new());
        let backend = Arc::new(SlowBackend::default());
        let router = Arc::new(CommandRouter::new(
            AccessList::new(["42"]).unwrap(),
            ResourceRegistry::default(),
            Arc::clone(&sessions) as Arc<dyn SessionStore>,
            Arc::clone(&backend) as Arc<dyn Backend>,
        ));
        let outbound = Arc::new(TelegramOutbound::new(server.bot.clone(), router.menu()));
        let handler = Arc::new(TelegramHandler::new(router, outbound, RestartSignal::new()));
        let bridge = IngressBridge::new(handler, IngressSettings::default());

        for text in ["Дата", "15.03.2030", "Дата"] {
            let body = serde_json::to_vec(&text_update(42, text)).unwrap();
            bridge.deliver(parse_update(&body).unwrap().unwrap()).unwrap();
        }

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while server.api.sent.lock().unwrap().len() < 3 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("all replies sent");

        assert_eq!(*backend.calls.lock().unwrap(), vec![
            Operation::GetDate,
            Operation::SetDate("15.03.2030".into()),
            Operation::GetDate,
        ]);
        let texts: Vec<String> = server
            .api
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert!(texts[0].contains("01.02.2030"));
        assert!(texts[1].contains("15.03.2030"));
        assert!(texts[2].contains("01.02.2030"));
        assert_eq!(
            sessions.get(&UserId::new("42")).pending_input,
            Some(PendingInput::AwaitingDate)
        );
        bridge.shutdown();
    }

    #[tokio::test]
    async fn register_webhook_calls_bot_api_in_order() {
        let server = mock_api().await;
        let secret = secrecy::Secret::new("s3cret".to_string());
        let url = crate::bot::webhook_url("https://bot.example.com", "/telegram/test-token")
            .unwrap();

        crate::bot::register_webhook(&server.bot, url, Some(&secret))
            .await
            .unwrap();

        let methods: Vec<String> = server
            .api
            .methods
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.to_ascii_lowercase())
            .collect();
        assert_eq!(methods, vec!["deletewebhook", "setwebhook", "setmycommands"]);
    }
}
