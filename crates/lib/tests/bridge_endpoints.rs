//! Integration tests for the messaging and broadcast endpoints.
//!
//! A mock channel service (axum) stands in for the Bot Framework connector and records every call;
//! the gateway router is served on a free loopback port and driven with reqwest.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use lib::config::{Config, FailurePolicy};
use lib::gateway::{router, GatewayState};
use lib::handler::{ActivityHandler, LoggingBot};
use lib::turn::TurnContext;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct ChannelService {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    channels: Arc<Vec<&'static str>>,
}

impl ChannelService {
    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Mock connector: records activity posts and conversation creations; lists `channels` for any team.
async fn spawn_channel_service(channels: Vec<&'static str>) -> (String, ChannelService) {
    let service = ChannelService {
        channels: Arc::new(channels),
        ..Default::default()
    };
    let app = Router::new()
        .route(
            "/v3/conversations/:conv/activities/:id",
            post(
                |State(s): State<ChannelService>,
                 Path((conv, id)): Path<(String, String)>,
                 Json(body): Json<Value>| async move {
                    s.calls.lock().unwrap().push((format!("reply {} {}", conv, id), body));
                    Json(json!({ "id": "r-1" }))
                },
            ),
        )
        .route(
            "/v3/conversations",
            post(|State(s): State<ChannelService>, Json(body): Json<Value>| async move {
                s.calls.lock().unwrap().push(("create".to_string(), body));
                Json(json!({ "id": "new-conv", "activityId": "a-1" }))
            }),
        )
        .route(
            "/v3/teams/:team/conversations",
            get(|State(s): State<ChannelService>, Path(team): Path<String>| async move {
                s.calls.lock().unwrap().push((format!("list {}", team), Value::Null));
                let conversations: Vec<Value> =
                    s.channels.iter().map(|id| json!({ "id": id })).collect();
                Json(json!({ "conversations": conversations }))
            }),
        )
        .with_state(service.clone());
    (serve(app).await, service)
}

struct FailingBot {
    turns: AtomicUsize,
}

#[async_trait]
impl ActivityHandler for FailingBot {
    async fn on_message_activity(&self, _ctx: &TurnContext) -> anyhow::Result<()> {
        self.turns.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("boom")
    }
}

async fn spawn_gateway(config: Config, bot: Arc<dyn ActivityHandler>) -> String {
    serve(router(GatewayState::from_config(config, bot))).await
}

fn message(channel: &str, service_url: &str) -> Value {
    json!({
        "type": "message",
        "id": "act-1",
        "channelId": channel,
        "serviceUrl": service_url,
        "from": { "id": "user-1", "name": "User" },
        "recipient": { "id": "bot-1", "name": "Bot" },
        "conversation": { "id": "conv-1" },
        "text": "hello"
    })
}

#[tokio::test]
async fn non_json_content_type_is_415_without_dispatch() {
    let bot = Arc::new(FailingBot {
        turns: AtomicUsize::new(0),
    });
    let base = spawn_gateway(Config::default(), bot.clone()).await;
    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", base))
        .header("Content-Type", "text/plain")
        .body(message("emulator", "http://127.0.0.1:9").to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 415);
    assert_eq!(bot.turns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_body_is_400() {
    let base = spawn_gateway(Config::default(), Arc::new(LoggingBot::default())).await;
    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", base))
        .header("Content-Type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
}

#[tokio::test]
async fn message_to_logging_bot_is_200_empty() {
    let base = spawn_gateway(Config::default(), Arc::new(LoggingBot::default())).await;
    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", base))
        .json(&message("msteams", "http://127.0.0.1:9"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn invoke_response_is_forwarded() {
    let base = spawn_gateway(Config::default(), Arc::new(LoggingBot::default())).await;
    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", base))
        .json(&json!({ "type": "invoke", "name": "adaptiveCard/action", "channelId": "msteams" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 501);
}

#[tokio::test]
async fn handler_error_on_emulator_reports_into_conversation() {
    let (service_url, service) = spawn_channel_service(vec![]).await;
    let bot = Arc::new(FailingBot {
        turns: AtomicUsize::new(0),
    });
    let base = spawn_gateway(Config::default(), bot.clone()).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", base))
        .json(&message("emulator", &service_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(bot.turns.load(Ordering::SeqCst), 1);

    let calls = service.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(route, _)| route == "reply conv-1 act-1"));
    assert_eq!(calls[0].1["text"], "The bot encountered an error or bug.");
    assert_eq!(
        calls[1].1["text"],
        "To continue to run this bot, please fix the bot source code."
    );
    assert_eq!(calls[2].1["type"], "trace");
    assert_eq!(calls[2].1["value"], "boom");
    assert_eq!(calls[2].1["label"], "TurnError");
    assert_eq!(calls[2].1["recipient"]["id"], "user-1");
}

#[tokio::test]
async fn handler_error_on_teams_sends_no_trace() {
    let (service_url, service) = spawn_channel_service(vec![]).await;
    let bot = Arc::new(FailingBot {
        turns: AtomicUsize::new(0),
    });
    let base = spawn_gateway(Config::default(), bot).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/messages", base))
        .json(&message("msteams", &service_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let calls = service.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, body)| body["type"] == "message"));
}

fn broadcast_config(service_url: &str) -> Config {
    let mut config = Config::default();
    config.broadcast.service_url = format!("{}/", service_url);
    config.broadcast.team_id = "19:team@thread.tacv2".to_string();
    config.broadcast.failure_policy = FailurePolicy::Continue;
    config
}

#[tokio::test]
async fn send_posts_image_to_every_channel() {
    let (service_url, service) =
        spawn_channel_service(vec!["19:general@thread.tacv2", "19:random@thread.tacv2"]).await;
    let base = spawn_gateway(broadcast_config(&service_url), Arc::new(LoggingBot::default())).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/messages/send", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["attempted"], 2);
    assert_eq!(
        report["delivered"],
        json!(["19:general@thread.tacv2", "19:random@thread.tacv2"])
    );

    let calls = service.calls();
    assert_eq!(calls[0].0, "list 19:team@thread.tacv2");
    let creates: Vec<_> = calls.iter().filter(|(route, _)| route == "create").collect();
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[0].1["isGroup"], true);
    assert_eq!(creates[0].1["channelData"]["channel"]["id"], "19:general@thread.tacv2");
    assert_eq!(creates[1].1["channelData"]["channel"]["id"], "19:random@thread.tacv2");
    let attachment = &creates[0].1["activity"]["attachments"][0];
    assert_eq!(attachment["contentType"], "image/png");
    assert_eq!(attachment["contentUrl"], "https://picsum.photos/200/300");
    assert_eq!(creates[0].1["activity"], creates[1].1["activity"]);
}

#[tokio::test]
async fn send_execsum_posts_adaptive_card() {
    let (service_url, service) = spawn_channel_service(vec!["19:general@thread.tacv2"]).await;
    let base = spawn_gateway(broadcast_config(&service_url), Arc::new(LoggingBot::default())).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/messages/send-execsum", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let calls = service.calls();
    let (_, create) = calls
        .iter()
        .find(|(route, _)| route == "create")
        .expect("one conversation created");
    let attachment = &create["activity"]["attachments"][0];
    assert_eq!(attachment["contentType"], "application/vnd.microsoft.card.adaptive");
    assert_eq!(attachment["content"]["type"], "AdaptiveCard");
    assert_eq!(attachment["content"]["actions"][0]["type"], "Action.OpenUrl");
}

#[tokio::test]
async fn broadcast_lookup_failure_still_answers_200() {
    let mut config = Config::default();
    config.broadcast.service_url = "http://127.0.0.1:9/".to_string();
    let base = spawn_gateway(config, Arc::new(LoggingBot::default())).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/messages/send", base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().is_empty());
}
