// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes, proxied to the BaaS auth server.

use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, ACCESS_TOKEN_COOKIE};
use crate::services::{AuthAccount, Session};
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Routes reachable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/reset-password", post(reset_password))
}

/// Routes that need a session (auth middleware applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/signout", post(sign_out))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 200))]
    pub full_name: Option<String>,
}

#[derive(Serialize)]
pub struct SignUpResponse {
    pub user: AuthAccount,
    /// Present only when the project does not require email confirmation
    pub session: Option<Session>,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, Json<SignUpResponse>)> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let full_name = req.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let outcome = state.auth.sign_up(&req.email, &req.password, full_name).await?;
    tracing::info!(user_id = %outcome.user.id, "User signed up");

    // The profile row is created by a database trigger; mirror it now if it
    // is already there. Failures are picked up by the next bulk sync.
    let result = state.sync.sync_specific_user(&req.email).await;
    if !result.success {
        tracing::info!(message = %result.message, "Post sign-up sync deferred");
    }

    let (jar, message) = match &outcome.session {
        Some(session) => (
            jar.add(session_cookie(session.access_token.clone())),
            "Account created".to_string(),
        ),
        None => (jar, "Check your email to confirm your account".to_string()),
    };

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SignUpResponse {
            user: outcome.user,
            session: outcome.session,
            message,
        }),
    ))
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<(CookieJar, Json<Session>)> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let session = state
        .auth
        .sign_in_with_password(&req.email, &req.password)
        .await
        .map_err(|e| match e {
            // Wrong credentials come back as 400 from the auth server
            AppError::Baas(err) if err.status == 400 => AppError::Unauthorized,
            other => other,
        })?;

    tracing::info!(user_id = %session.user.id, "User signed in");
    let jar = jar.add(session_cookie(session.access_token.clone()));
    Ok((jar, Json(session)))
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    if let Err(e) = state.auth.sign_out(&user.access_token).await {
        // The cookie is cleared regardless; the token simply expires
        tracing::warn!(user_id = %user.user_id, error = %e, "Failed to revoke session");
    }

    let jar = jar.remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"));
    Ok((
        jar,
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    ))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let redirect_to = format!("{}/auth", state.config.frontend_url.trim_end_matches('/'));
    state
        .auth
        .reset_password_for_email(&req.email, Some(&redirect_to))
        .await?;

    Ok(Json(MessageResponse {
        message: "If that address has an account, a reset link is on its way".to_string(),
    }))
}
