#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End to end: webhook POST, per-user bridge, router, HTTP backend, and the
//! reply going out to a mock Bot API.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    axum::{
        Json, Router,
        body::{Body, Bytes},
        extract::State,
        http::{Request, StatusCode, Uri},
        routing::post,
    },
    mockito::{Matcher, Server},
    secrecy::Secret,
    serde_json::{Value, json},
    sheetbot_backend::{BackendTimeouts, HttpBackend},
    sheetbot_gateway::{GatewayState, SECRET_TOKEN_HEADER, build_app},
    sheetbot_routing::{AccessList, CommandRouter, ResourceRegistry, reply},
    sheetbot_sessions::MemorySessionStore,
    sheetbot_telegram::{
        IngressBridge, IngressSettings, RestartSignal, TelegramHandler, TelegramOutbound, bot,
    },
    tower::ServiceExt,
};

const WEBHOOK: &str = "/telegram/hook";
const SECRET: &str = "s3cret";

#[derive(Clone, Default)]
struct SentMessages(Arc<Mutex<Vec<Value>>>);

impl SentMessages {
    async fn wait_for(&self, count: usize) -> Vec<Value> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let sent = self.0.lock().unwrap();
                    if sent.len() >= count {
                        return sent.clone();
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("replies were not sent in time")
    }
}

async fn bot_api(State(sent): State<SentMessages>, uri: Uri, body: Bytes) -> Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    if !method.eq_ignore_ascii_case("SendMessage") {
        return Json(json!({ "ok": true, "result": true }));
    }
    let request: Value = serde_json::from_slice(&body).unwrap();
    let chat_id = request["chat_id"].clone();
    sent.0.lock().unwrap().push(request);
    Json(json!({
        "ok": true,
        "result": {
            "message_id": 1,
            "date": 0,
            "chat": { "id": chat_id, "type": "private", "first_name": "Test" },
            "text": "ok"
        }
    }))
}

async fn spawn_bot_api() -> (teloxide::Bot, SentMessages) {
    let sent = SentMessages::default();
    let app = Router::new()
        .route("/{*path}", post(bot_api))
        .with_state(sent.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api_url = url::Url::parse(&format!("http://{addr}/")).unwrap();
    let bot = bot::build_bot(&Secret::new("test-token".into()), Some(api_url)).unwrap();
    (bot, sent)
}

async fn app_with(backend_url: &str) -> (Router, SentMessages) {
    let (bot, sent) = spawn_bot_api().await;
    let backend = HttpBackend::new(
        url::Url::parse(backend_url).unwrap(),
        BackendTimeouts::default(),
    )
    .unwrap();
    let router = Arc::new(CommandRouter::new(
        AccessList::new(["42"]).unwrap(),
        ResourceRegistry::default(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(backend),
    ));
    let outbound = Arc::new(TelegramOutbound::new(bot, router.menu()));
    let handler = Arc::new(TelegramHandler::new(router, outbound, RestartSignal::new()));
    let bridge = IngressBridge::new(handler, IngressSettings::default());

    let state = GatewayState::new(bridge, WEBHOOK)
        .with_webhook_secret(Some(Secret::new(SECRET.to_string())));
    (build_app(Arc::new(state)), sent)
}

async fn post_update(app: &Router, update_id: u64, user_id: u64, text: &str) -> StatusCode {
    let body = json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1,
            "chat": { "id": 1000 + user_id, "type": "private", "first_name": "U" },
            "from": { "id": user_id, "is_bot": false, "first_name": "U" },
            "text": text
        }
    });
    let request = Request::builder()
        .method("POST")
        .uri(WEBHOOK)
        .header("content-type", "application/json")
        .header(SECRET_TOKEN_HEADER, SECRET)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn date_prompt_then_submission() {
    let mut backend = Server::new_async().await;
    let read = backend
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"date":"01.02.2030"}"#)
        .expect(1)
        .create_async()
        .await;
    let write = backend
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "new_date": "15.03.2030" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"ok"}"#)
        .expect(1)
        .create_async()
        .await;

    let (app, sent) = app_with(&backend.url()).await;

    assert_eq!(post_update(&app, 1, 42, "Дата").await, StatusCode::OK);
    let replies = sent.wait_for(1).await;
    assert!(replies[0]["text"].as_str().unwrap().contains("01.02.2030"));
    assert_eq!(replies[0]["chat_id"], 1042);
    // The date prompt hides the keyboard so the user can type.
    assert_eq!(replies[0]["reply_markup"]["remove_keyboard"], true);

    assert_eq!(post_update(&app, 2, 42, "15.03.2030").await, StatusCode::OK);
    let replies = sent.wait_for(2).await;
    assert!(replies[1]["text"].as_str().unwrap().contains("15.03.2030"));
    assert!(replies[1]["reply_markup"]["keyboard"].is_array());

    read.assert_async().await;
    write.assert_async().await;
}

#[tokio::test]
async fn stranger_is_denied_without_touching_the_backend() {
    let mut backend = Server::new_async().await;
    let untouched = backend.mock("GET", "/").expect(0).create_async().await;

    let (app, sent) = app_with(&backend.url()).await;

    assert_eq!(post_update(&app, 1, 7, "Дата").await, StatusCode::OK);
    let replies = sent.wait_for(1).await;
    assert_eq!(replies[0]["text"], reply::ACCESS_DENIED);
    untouched.assert_async().await;
}

#[tokio::test]
async fn backend_error_message_reaches_the_user() {
    let mut backend = Server::new_async().await;
    backend
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"error","message":"лист не найден"}"#)
        .create_async()
        .await;

    let (app, sent) = app_with(&backend.url()).await;

    assert_eq!(post_update(&app, 1, 42, "Очистить").await, StatusCode::OK);
    let replies = sent.wait_for(1).await;
    assert!(replies[0]["text"].as_str().unwrap().contains("лист не найден"));
}
