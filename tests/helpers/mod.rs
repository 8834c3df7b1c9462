#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mailcfg::auth::nonce::NonceKey;
use mailcfg::auth::token;
use mailcfg::config::Config;
use mailcfg::mail::mailer::RecordingMailer;
use mailcfg::rbac::Permission;
use mailcfg::store::memory::MemoryStore;
use mailcfg::store::{AppState, PrincipalRecord, PrincipalStore};

pub const ADMIN_TOKEN: &str = "mcfg_integration_admin_token";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

/// Config with test defaults: in-memory store, fixed nonce secret, and a
/// bootstrap admin token.
pub fn test_config() -> Config {
    Config {
        listen: "127.0.0.1:0".into(),
        database_url: None,
        site_name: "Test Site".into(),
        admin_email: "root@example.com".into(),
        default_from: "noreply@example.com".into(),
        sendmail_command: None,
        smtp_verify_tls: false,
        smtp_timeout_secs: 5,
        debug: false,
        log: None,
        nonce_secret: Some("integration-secret".into()),
        admin_token: Some(ADMIN_TOKEN.into()),
        trust_proxy_headers: false,
        dev_mode: false,
    }
}

pub async fn test_app() -> TestApp {
    test_app_with_mailer(RecordingMailer::new()).await
}

/// Build state around `mailer`, run bootstrap, and mount the full router.
pub async fn test_app_with_mailer(mailer: RecordingMailer) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(mailer);

    let state = AppState {
        settings: store.clone(),
        principals: store.clone(),
        mailer: mailer.clone(),
        nonces: NonceKey::from_secret(config.nonce_secret.as_deref()).expect("nonce key"),
        config: Arc::new(config),
    };

    mailcfg::store::bootstrap::run(&state)
        .await
        .expect("bootstrap failed");

    TestApp {
        app: test_router(state.clone()),
        state,
        store,
        mailer,
    }
}

pub fn test_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .merge(mailcfg::api::router())
        .with_state(state)
}

/// Register an extra principal. Returns its raw bearer token.
pub async fn add_principal(state: &AppState, name: &str, permissions: &[Permission]) -> String {
    let (raw, hash) = token::generate_api_token();
    state
        .principals
        .upsert_token(
            &hash,
            &PrincipalRecord {
                user_name: name.into(),
                permissions: permissions.to_vec(),
                is_active: true,
            },
        )
        .await
        .expect("upsert principal");
    raw
}

/// Render the settings page as admin and return `(save_nonce, test_nonce)`.
pub async fn admin_nonces(app: &Router) -> (String, String) {
    let (status, body) = get_json(app, ADMIN_TOKEN, "/api/admin/smtp").await;
    assert_eq!(status, StatusCode::OK, "render failed: {body}");
    (
        body["nonces"]["save"].as_str().expect("save nonce").to_owned(),
        body["nonces"]["test"].as_str().expect("test nonce").to_owned(),
    )
}

/// Save `settings` as admin with a fresh nonce.
pub async fn admin_save(app: &Router, settings: Value) -> (StatusCode, Value) {
    let (save_nonce, _) = admin_nonces(app).await;
    put_json(
        app,
        ADMIN_TOKEN,
        "/api/admin/smtp",
        serde_json::json!({ "nonce": save_nonce, "settings": settings }),
    )
    .await
}

/// Send a GET request with Bearer auth.
pub async fn get_json(app: &Router, token: &str, path: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(path);
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Send a POST request with Bearer auth and JSON body.
pub async fn post_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "POST", token, path, body).await
}

/// Send a PUT request with Bearer auth and JSON body.
pub async fn put_json(app: &Router, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "PUT", token, path, body).await
}

async fn send_json(
    app: &Router,
    method: &str,
    token: &str,
    path: &str,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header("Content-Type", "application/json");
    if !token.is_empty() {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = body_json(resp).await;
    (status, body)
}

/// Extract JSON body from a response.
async fn body_json(resp: axum::http::Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}
