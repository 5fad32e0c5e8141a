// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use church_hub::config::Config;
use church_hub::db::BaasDb;
use church_hub::middleware::auth::{Claims, TOKEN_AUDIENCE};
use church_hub::routes::create_router;
use church_hub::services::AuthClient;
use church_hub::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Build a state whose BaaS calls go to `base_url`.
#[allow(dead_code)]
pub fn test_state(base_url: &str) -> AppState {
    let mut config = Config::test_default();
    config.supabase_url = base_url.to_string();
    let http = reqwest::Client::new();
    let db = BaasDb::service_role(http.clone(), base_url, "anon-key", "service-key");
    let auth = AuthClient::new(http, base_url, "anon-key", "service-key");
    AppState::with_clients(config, db, auth)
}

/// Create a test app with an offline database.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let auth = AuthClient::new(
        reqwest::Client::new(),
        &config.supabase_url,
        &config.anon_key,
        &config.service_role_key,
    );
    let state = Arc::new(AppState::with_clients(config, BaasDb::new_mock(), auth));
    (create_router(state.clone()), state)
}

/// Create a test app backed by a wiremock BaaS.
#[allow(dead_code)]
pub fn create_mocked_app(server: &MockServer) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(test_state(&server.uri()));
    (create_router(state.clone()), state)
}

/// Sign an access token the way the BaaS auth server does.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: Uuid, email: &str, secret: &[u8]) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
        exp: now + 3600,
        aud: TOKEN_AUDIENCE.to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .unwrap()
}

/// Serve `roles` from `user_roles` for this user.
#[allow(dead_code)]
pub async fn mock_roles(server: &MockServer, user_id: Uuid, roles: &[&str]) {
    let rows: Vec<Value> = roles
        .iter()
        .map(|r| json!({ "id": 1, "user_id": user_id, "role": r }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/rest/v1/user_roles"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Matches requests whose JSON body is an array (bulk inserts).
#[allow(dead_code)]
pub struct ArrayBody;

impl wiremock::Match for ArrayBody {
    fn matches(&self, request: &wiremock::Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .map(|v| v.is_array())
            .unwrap_or(false)
    }
}

/// Matches requests whose JSON body is a single object.
#[allow(dead_code)]
pub struct ObjectBody;

impl wiremock::Match for ObjectBody {
    fn matches(&self, request: &wiremock::Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .map(|v| v.is_object())
            .unwrap_or(false)
    }
}
