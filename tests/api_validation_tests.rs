// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API input validation tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::MockServer;

mod common;

fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// App backed by a mock BaaS where the caller holds `roles`.
async fn app_with_roles(roles: &[&str]) -> (axum::Router, String, MockServer) {
    let server = MockServer::start().await;
    let (app, state) = common::create_mocked_app(&server);
    let user_id = Uuid::new_v4();
    common::mock_roles(&server, user_id, roles).await;
    let secret = state.config.jwt_secret.clone().unwrap();
    let token = common::create_test_jwt(user_id, "staff@church.org", &secret);
    (app, token, server)
}

#[tokio::test]
async fn test_profile_update_rejects_empty_name() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(
        Uuid::new_v4(),
        "ann@church.org",
        state.config.jwt_secret.as_deref().unwrap(),
    );

    let response = app
        .oneshot(json_request("PUT", "/api/me", Some(&token), json!({ "full_name": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_update_requires_a_field() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt(
        Uuid::new_v4(),
        "ann@church.org",
        state.config.jwt_secret.as_deref().unwrap(),
    );

    let response = app
        .oneshot(json_request("PUT", "/api/me", Some(&token), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert_eq!(body["details"], "Nothing to update");
}

#[tokio::test]
async fn test_create_member_rejects_bad_email() {
    let (app, token, _server) = app_with_roles(&["admin"]).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/members",
            Some(&token),
            json!({ "email": "not-an-email", "full_name": "Somebody" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_announcement_priority_checked() {
    let (app, token, _server) = app_with_roles(&["pastor"]).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/announcements",
            Some(&token),
            json!({ "title": "Potluck", "priority": "whenever" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_role_rejected() {
    let (app, token, _server) = app_with_roles(&["super_admin"]).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/admin/roles",
            Some(&token),
            json!({ "user_id": Uuid::new_v4(), "role": "bishop" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::json_body(response).await;
    assert!(body["details"].as_str().unwrap().contains("bishop"));
}

#[tokio::test]
async fn test_role_path_must_be_uuid() {
    let (app, token, _server) = app_with_roles(&["super_admin"]).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/admin/roles/12345")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_short_password() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/signup",
            None,
            json!({ "email": "new@church.org", "password": "123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signin_rejects_bad_email() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/signin",
            None,
            json!({ "email": "nobody", "password": "secret" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
