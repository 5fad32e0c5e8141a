// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth server client.
//!
//! Handles:
//! - Sign up / sign in / sign out / password recovery for end users
//! - Resolving an access token to its user
//! - Admin user listing, creation and deletion (service-role key)

use crate::error::{AppError, BaasError};
use crate::models::normalize_email;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Users fetched per page when scanning the admin user list.
const ADMIN_PAGE_SIZE: u32 = 1000;

/// Auth server client.
#[derive(Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    auth_url: String,
    anon_key: String,
    service_role_key: String,
}

impl AuthClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        anon_key: &str,
        service_role_key: &str,
    ) -> Self {
        Self {
            http,
            auth_url: format!("{}/auth/v1", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    fn public(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{}", self.auth_url, path))
            .header("apikey", &self.anon_key)
    }

    fn admin(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/admin/{}", self.auth_url, path))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    // ─── End-user Operations ────────────────────────────────────

    /// Register a new account. A session is returned only when the project
    /// confirms emails automatically.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<SignUpOutcome, AppError> {
        let mut data = serde_json::Map::new();
        if let Some(name) = full_name {
            data.insert("full_name".into(), name.into());
        }

        let body = serde_json::json!({
            "email": normalize_email(email),
            "password": password,
            "data": data,
        });

        let value: serde_json::Value =
            send_json(self.public(reqwest::Method::POST, "signup").json(&body)).await?;

        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad sign-up session: {}", e)))?;
            Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            })
        } else {
            let user: AuthAccount = serde_json::from_value(value)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Bad sign-up user: {}", e)))?;
            Ok(SignUpOutcome {
                user,
                session: None,
            })
        }
    }

    /// Password grant.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let body = serde_json::json!({
            "email": normalize_email(email),
            "password": password,
        });

        send_json(
            self.public(reqwest::Method::POST, "token")
                .query(&[("grant_type", "password")])
                .json(&body),
        )
        .await
    }

    /// Revoke the session that owns `access_token`.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        send(
            self.public(reqwest::Method::POST, "logout")
                .bearer_auth(access_token),
        )
        .await
    }

    /// Send a password recovery email.
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AppError> {
        let mut request = self
            .public(reqwest::Method::POST, "recover")
            .json(&serde_json::json!({ "email": normalize_email(email) }));
        if let Some(url) = redirect_to {
            request = request.query(&[("redirect_to", url)]);
        }
        send(request).await
    }

    /// Resolve an access token to its user.
    pub async fn get_user(&self, access_token: &str) -> Result<AuthAccount, AppError> {
        send_json(
            self.public(reqwest::Method::GET, "user")
                .bearer_auth(access_token),
        )
        .await
    }

    // ─── Admin Operations ───────────────────────────────────────

    /// One page of users (1-indexed pages).
    pub async fn list_users(&self, page: u32, per_page: u32) -> Result<Vec<AuthAccount>, AppError> {
        let list: UserList = send_json(
            self.admin(reqwest::Method::GET, "users")
                .query(&[("page", page.to_string()), ("per_page", per_page.to_string())]),
        )
        .await?;
        Ok(list.users)
    }

    /// Every user, page by page.
    pub async fn list_all_users(&self) -> Result<Vec<AuthAccount>, AppError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let users = self.list_users(page, ADMIN_PAGE_SIZE).await?;
            let len = users.len();
            all.extend(users);
            if len < ADMIN_PAGE_SIZE as usize {
                return Ok(all);
            }
            page += 1;
        }
    }

    /// Scan the admin user list for an email (case-insensitive).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<AuthAccount>, AppError> {
        let wanted = normalize_email(email);
        let mut page = 1;
        loop {
            let users = self.list_users(page, ADMIN_PAGE_SIZE).await?;
            let len = users.len();
            if let Some(user) = users
                .into_iter()
                .find(|u| u.email.as_deref().map(normalize_email).as_deref() == Some(wanted.as_str()))
            {
                return Ok(Some(user));
            }
            if len < ADMIN_PAGE_SIZE as usize {
                return Ok(None);
            }
            page += 1;
        }
    }

    /// Create a confirmed user.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<AuthAccount, AppError> {
        let body = serde_json::json!({
            "email": normalize_email(email),
            "password": password,
            "email_confirm": true,
            "user_metadata": { "full_name": full_name },
        });
        send_json(self.admin(reqwest::Method::POST, "users").json(&body)).await
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        send(self.admin(reqwest::Method::DELETE, &format!("users/{}", user_id))).await
    }
}

async fn send(request: RequestBuilder) -> Result<(), AppError> {
    let response = request.send().await.map_err(BaasError::transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(BaasError::from_body(status.as_u16(), &body).into())
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AppError> {
    let response = request.send().await.map_err(BaasError::transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BaasError::from_body(status.as_u16(), &body).into());
    }
    response
        .json()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Auth response parse error: {}", e)))
}

/// User as known to the auth server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthAccount {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_sign_in_at: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, unknown>"))]
    pub user_metadata: serde_json::Value,
}

impl AuthAccount {
    /// Display name from sign-up metadata.
    pub fn full_name(&self) -> Option<String> {
        ["full_name", "fullName", "name"].iter().find_map(|k| {
            self.user_metadata
                .get(*k)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
    }
}

/// Session issued by the password grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
    pub user: AuthAccount,
}

#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthAccount,
    pub session: Option<Session>,
}

#[derive(Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<AuthAccount>,
}
