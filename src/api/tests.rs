use super::*;
use crate::gateway::tests::{
    demo_seed, harness, harness_with, quiet_reply_config, upsert, MockProvider, MockWhatsApp,
    SendMode,
};
use crate::ingest::webhook::sign;
use axum::{body::Body, http::Request};
use http_body_util::BodyExt;
use hybridflow_core::config::{EvolutionConfig, SocketConfig};
use hybridflow_store::Store;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Store,
    tenant_id: i64,
    whatsapp: Arc<MockWhatsApp>,
}

async fn app_with(mode: SendMode, config: Config) -> TestApp {
    let h = if mode == SendMode::Ok {
        harness().await
    } else {
        harness_with(
            MockProvider::replying("Hello!"),
            mode,
            None,
            quiet_reply_config(),
            demo_seed(),
        )
        .await
    };
    let (sockets, _events) = SocketRegistry::new(config.socket.clone());
    let state = ApiState::new(Arc::new(h.gateway), Arc::new(sockets), Arc::new(config));
    TestApp {
        router: build_router(state),
        store: h.store,
        tenant_id: h.tenant_id,
        whatsapp: h.whatsapp,
    }
}

async fn test_app() -> TestApp {
    app_with(SendMode::Ok, Config::default()).await
}

fn config_with_api_key(key: &str) -> Config {
    let mut config = Config::default();
    config.server.api_key = key.to_string();
    config
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_body(event: &str, instance: &str, data: Value) -> String {
    json!({"event": event, "instance": instance, "data": data}).to_string()
}

/// Parse response body as JSON.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

const CHAT: &str = "5511999999999@s.whatsapp.net";

// ---------------------------------------------------------------------------
// Auth helpers
// ---------------------------------------------------------------------------

#[test]
fn test_constant_time_eq() {
    assert!(constant_time_eq("abc", "abc"));
    assert!(!constant_time_eq("abc", "abd"));
    assert!(!constant_time_eq("abc", "abcd"));
    assert!(constant_time_eq("", ""));
}

#[test]
fn test_check_auth() {
    let key = Some("secret".to_string());
    assert!(check_auth(&HeaderMap::new(), &None).is_ok());

    let (status, Json(body)) = check_auth(&HeaderMap::new(), &key).unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing Authorization header");

    let mut headers = HeaderMap::new();
    headers.insert("authorization", "Basic secret".parse().unwrap());
    let (_, Json(body)) = check_auth(&headers, &key).unwrap_err();
    assert_eq!(body["error"], "invalid Authorization header");

    headers.insert("authorization", "Bearer wrong".parse().unwrap());
    let (_, Json(body)) = check_auth(&headers, &key).unwrap_err();
    assert_eq!(body["error"], "invalid token");

    headers.insert("authorization", "Bearer secret".parse().unwrap());
    assert!(check_auth(&headers, &key).is_ok());
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_no_auth() {
    let app = app_with(SendMode::Ok, config_with_api_key("secret")).await;
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["database"], "ok");
    assert_eq!(json["providers"]["default"], "mock");
    assert_eq!(json["workflow"]["enabled"], false);
    assert_eq!(json["socket"]["connections"], 0);
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_webhook_inbound_reply() {
    let app = test_app().await;
    let body = webhook_body("messages.upsert", "demo", upsert(CHAT, "M1", json!(false), "Hi"));
    let resp = app
        .router
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["action"], "ai_replied");
    assert_eq!(json["reply_preview"], "Hello! How can I help?");
    assert_eq!(app.whatsapp.sent().len(), 1);
}

#[tokio::test]
async fn test_webhook_singular_path_alias() {
    let app = test_app().await;
    let body = webhook_body("messages.upsert", "demo", upsert(CHAT, "M2", json!(false), "Hi"));
    let resp = app
        .router
        .oneshot(post_json("/webhook/evolution", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["action"], "ai_replied");
}

#[tokio::test]
async fn test_webhook_acknowledges_downstream_failure() {
    let app = app_with(SendMode::Fail, Config::default()).await;
    let body = webhook_body("MESSAGES_UPSERT", "demo", upsert(CHAT, "M1", json!(false), "Hi"));
    let resp = app
        .router
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["action"], "evolution_send_failed");
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_webhook_unknown_instance_404() {
    let app = test_app().await;
    let body = webhook_body("messages.upsert", "ghost", upsert(CHAT, "M1", json!(false), "Hi"));
    let resp = app
        .router
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert!(json["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_webhook_framing_errors() {
    let app = test_app().await;
    let cases = [
        ("", StatusCode::BAD_REQUEST),
        ("{broken", StatusCode::BAD_REQUEST),
        (r#"{"instance":"demo","data":{}}"#, StatusCode::BAD_REQUEST),
        (r#"{"event":"messages.upsert","data":{}}"#, StatusCode::BAD_REQUEST),
    ];
    for (body, expected) in cases {
        let resp = app
            .router
            .clone()
            .oneshot(post_json("/webhooks/evolution", body))
            .await
            .unwrap();
        assert_eq!(resp.status(), expected, "body: {body}");
    }
}

#[tokio::test]
async fn test_webhook_non_message_events() {
    let app = test_app().await;

    let body = webhook_body("connection.update", "demo", json!({"state": "open"}));
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["action"], "acknowledged");

    let body = webhook_body("qrcode.updated", "demo", json!({}));
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["action"], "ignored");
    assert_eq!(json["ignored"], "qrcode.updated");

    let body = webhook_body("messages.upsert", "demo", json!({"key": {}}));
    let resp = app
        .router
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["action"], "missing_ids");
    assert_eq!(json["note"], "No chat_id or message_id");
}

#[tokio::test]
async fn test_webhook_signature_enforced_once_configured() {
    let mut config = Config::default();
    config.evolution = EvolutionConfig {
        webhook_secret: "s3cret".into(),
        ..Default::default()
    };
    let app = app_with(SendMode::Ok, config).await;
    let body = webhook_body("messages.upsert", "demo", upsert(CHAT, "M1", json!(true), "me"));

    let resp = app
        .router
        .clone()
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let signature = sign("s3cret", body.as_bytes()).unwrap();
    let req = Request::post("/webhooks/evolution")
        .header("Content-Type", "application/json")
        .header("X-Evolution-Signature", format!("sha256={signature}"))
        .body(Body::from(body))
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["action"], "paused");
}

// ---------------------------------------------------------------------------
// Cron
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cron_requires_secret() {
    let app = test_app().await;

    let req = Request::post("/cron/auto-resume").body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = Request::post("/cron/auto-resume")
        .header("X-Cron-Secret", "wrong")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cron_resumes_stale_sessions() {
    let app = test_app().await;
    app.store
        .set_paused(
            app.tenant_id,
            CHAT,
            "human_takeover",
            chrono::Utc::now() - chrono::Duration::hours(5),
        )
        .await
        .unwrap();

    let req = Request::post("/cron/auto-resume")
        .header("X-Cloudscheduler-Token", "change-me-cron-secret")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["resumed_count"], 1);
    assert_eq!(json["cleaned_up_events"], 0);

    let session = app.store.get_session(app.tenant_id, CHAT).await.unwrap().unwrap();
    assert!(!session.is_paused);
}

// ---------------------------------------------------------------------------
// Sessions and events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sessions_require_auth() {
    let app = app_with(SendMode::Ok, config_with_api_key("secret")).await;
    let uri = format!("/api/sessions/demo/{CHAT}");
    let req = Request::get(&uri).body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::get(&uri)
        .header("Authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    // Authorized, but the chat was never seen.
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pause_get_resume_cycle() {
    let app = test_app().await;
    let base = format!("/api/sessions/demo/{CHAT}");

    let resp = app
        .router
        .clone()
        .oneshot(post_json(&format!("{base}/pause"), r#"{"reason":"agent"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["session"]["is_paused"], true);
    assert_eq!(json["session"]["pause_reason"], "agent");
    assert!(json["session"]["last_human_at"].is_string());

    let req = Request::get(&base).body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["session"]["is_paused"], true);

    // An inbound message is now gated.
    let body = webhook_body("messages.upsert", "demo", upsert(CHAT, "M1", json!(false), "Hi"));
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/webhooks/evolution", &body))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["action"], "ignored_paused");

    let resp = app
        .router
        .clone()
        .oneshot(post_json(&format!("{base}/resume"), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["session"]["is_paused"], false);
    assert!(json["session"]["pause_reason"].is_null());
}

#[tokio::test]
async fn test_pause_without_body_uses_manual_reason() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(post_json(&format!("/api/sessions/demo/{CHAT}/pause"), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["session"]["pause_reason"], "manual");
}

#[tokio::test]
async fn test_session_routes_404() {
    let app = test_app().await;

    let req = Request::get(&format!("/api/sessions/ghost/{CHAT}"))
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .router
        .oneshot(post_json(&format!("/api/sessions/demo/{CHAT}/resume"), ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_events_listing() {
    let app = test_app().await;
    for id in ["M1", "M2", "M3"] {
        let body = webhook_body("messages.upsert", "demo", upsert(CHAT, id, json!(false), "Hi"));
        app.router
            .clone()
            .oneshot(post_json("/webhooks/evolution", &body))
            .await
            .unwrap();
    }

    let req = Request::get("/api/events?instance=demo&limit=2")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["events"][0]["message_id"], "M3");
    assert_eq!(json["events"][0]["action_taken"], "ai_replied");
    assert_eq!(json["events"][0]["instance_name"], "demo");

    let req = Request::get("/api/events?instance=ghost").body(Body::empty()).unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Manual send
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_message() {
    let app = test_app().await;
    let body = json!({"instance": "demo", "chat_id": CHAT, "text": "Your order shipped"}).to_string();
    let resp = app
        .router
        .oneshot(post_json("/api/evolution/send-message", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["confirmed"], true);

    let sent = app.whatsapp.sent();
    assert_eq!(sent[0].instance, "demo");
    assert_eq!(sent[0].text, "Your order shipped");
}

#[tokio::test]
async fn test_send_message_timeout_is_unconfirmed() {
    let app = app_with(SendMode::Timeout, Config::default()).await;
    let body = json!({"instance": "demo", "chat_id": CHAT, "text": "hi"}).to_string();
    let resp = app
        .router
        .oneshot(post_json("/api/evolution/send-message", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["confirmed"], false);
}

#[tokio::test]
async fn test_send_message_errors() {
    let app = app_with(SendMode::Fail, Config::default()).await;

    let body = json!({"instance": "demo", "chat_id": CHAT, "text": "hi"}).to_string();
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/api/evolution/send-message", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body = json!({"instance": "demo", "chat_id": CHAT, "text": "  "}).to_string();
    let resp = app
        .router
        .clone()
        .oneshot(post_json("/api/evolution/send-message", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .router
        .oneshot(post_json("/api/evolution/send-message", r#"{"instance":"demo"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Socket management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_websocket_connect_disabled() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(post_json("/api/websocket/connect", r#"{"mode":"global"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "socket mode is disabled");
}

#[tokio::test]
async fn test_websocket_connect_validation() {
    let mut config = Config::default();
    config.socket = SocketConfig {
        enabled: true,
        ..Default::default()
    };
    let app = app_with(SendMode::Ok, config).await;

    let resp = app
        .router
        .clone()
        .oneshot(post_json("/api/websocket/connect", r#"{"mode":"instance"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/websocket/connect",
            r#"{"mode":"instance","instance_name":"ghost"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .router
        .clone()
        .oneshot(post_json("/api/websocket/connect", r#"{"mode":"sideways"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // No server url anywhere in the config.
    let resp = app
        .router
        .oneshot(post_json("/api/websocket/connect", r#"{"mode":"global"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_websocket_status_and_disconnect() {
    let app = test_app().await;

    let req = Request::get("/api/websocket/status").body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["enabled"], false);
    assert_eq!(json["connections"], json!([]));

    let resp = app
        .router
        .clone()
        .oneshot(post_json("/api/websocket/disconnect", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["disconnected_count"], 0);

    let resp = app
        .router
        .oneshot(post_json("/api/websocket/disconnect", r#"{"instance_name":"demo"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_instance_registers_tenant() {
    let app = test_app().await;
    let body = json!({
        "instance_name": "bakery",
        "webhook_url": "https://hooks.example.com/webhook/evolution",
        "system_prompt": "You answer for the bakery."
    })
    .to_string();
    let resp = app
        .router
        .oneshot(post_json("/api/instances", &body))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    assert_eq!(json["instance"]["instance"]["instanceName"], "bakery");

    let tenant = app.store.find_tenant_by_instance("bakery").await.unwrap().unwrap();
    assert_eq!(tenant.system_prompt.as_deref(), Some("You answer for the bakery."));
}

#[tokio::test]
async fn test_instance_state_and_unsupported_qr() {
    let app = test_app().await;

    let req = Request::get("/api/instances/demo/state").body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["state"]["instance"]["state"], "open");

    // The mock keeps the default lifecycle impl for QR codes.
    let req = Request::get("/api/instances/demo/qr").body(Body::empty()).unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let req = Request::delete("/api/instances/demo").body(Body::empty()).unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}
