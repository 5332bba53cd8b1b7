//! Shared helpers for gateway integration tests.
#![allow(dead_code)]

use axum::{Router, body::Body, http::Request, response::Response};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tower::ServiceExt;

use schedule_gateway::{AppState, Config, app};

pub const SECRET: &str = "s3cret";
pub const COOKIE: &str = "app_session";

pub fn test_config() -> Config {
    config_with(&[])
}

/// Test config with extra environment entries on top of the session secret.
pub fn config_with(vars: &[(&str, &str)]) -> Config {
    Config::from_lookup(|key| match key {
        "SESSION_SECRET" => Some(SECRET.to_string()),
        _ => vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()),
    })
    .expect("test config")
}

pub fn test_app(routes: Router<AppState>) -> Router {
    app_with_config(routes, test_config())
}

pub fn app_with_config(routes: Router<AppState>, config: Config) -> Router {
    let state = AppState::from_config(&config).expect("test state");
    app::build_router_with(routes, state, &config)
}

/// Sign a session token the way the identity service does.
pub fn mint(payload: serde_json::Value) -> String {
    let h = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
    let p = URL_SAFE_NO_PAD.encode(payload.to_string());
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(format!("{h}.{p}").as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{h}.{p}.{sig}")
}

pub fn session_for(role: &str, exp_offset_seconds: i64) -> String {
    let exp = Utc::now().timestamp() + exp_offset_seconds;
    let token = mint(json!({
        "sub": "u1",
        "email": "u1@example.com",
        "name": "User One",
        "role": role,
        "exp": exp,
    }));
    format!("{COOKIE}={token}")
}

pub async fn get(app: Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
