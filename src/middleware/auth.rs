// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token authentication middleware.
//!
//! Tokens are issued by the BaaS auth server. With the project's JWT secret
//! configured they are checked locally; otherwise the auth server is asked
//! who the token belongs to.

use crate::error::AppError;
use crate::models::{Permission, Permissions};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Name of the cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Audience the auth server puts on signed-in users' tokens.
pub const TOKEN_AUDIENCE: &str = "authenticated";

/// Access token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (auth user id)
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Database role, `authenticated` for signed-in users
    #[serde(default)]
    pub role: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    pub aud: String,
}

/// Authenticated user extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    /// Raw token, for queries that must run under the user's RLS policies
    pub access_token: String,
}

impl AuthUser {
    /// Fail with 403 unless this user holds `permission`.
    pub async fn require(
        &self,
        state: &AppState,
        permission: Permission,
    ) -> Result<Permissions, AppError> {
        state
            .roles
            .require(self.user_id, self.email.as_deref(), permission)
            .await
    }
}

/// Pull the token from the session cookie or the `Authorization` header.
pub fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Verify an HS256 token signed with the project's JWT secret.
pub fn verify_token(token: &str, secret: &[u8]) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(error = %e, "Access token rejected");
        AppError::InvalidToken
    })?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::InvalidToken)?;

    Ok(AuthUser {
        user_id,
        email: data.claims.email,
        access_token: token.to_string(),
    })
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, &request).ok_or(AppError::Unauthorized)?;

    let auth_user = match &state.config.jwt_secret {
        Some(secret) => verify_token(&token, secret)?,
        None => {
            let account = state.auth.get_user(&token).await.map_err(|e| {
                tracing::debug!(error = %e, "Auth server rejected token");
                AppError::InvalidToken
            })?;
            AuthUser {
                user_id: account.id,
                email: account.email,
                access_token: token,
            }
        }
    };

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"unit_test_secret";

    fn token(sub: &str, aud: &str, exp_offset: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("a@church.org".to_string()),
            role: Some("authenticated".to_string()),
            exp,
            aud: aud.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn test_valid_token() {
        let id = Uuid::new_v4();
        let user = verify_token(&token(&id.to_string(), TOKEN_AUDIENCE, 3600), SECRET).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.email.as_deref(), Some("a@church.org"));
    }

    #[test]
    fn test_rejects_wrong_audience_expiry_and_subject() {
        let id = Uuid::new_v4().to_string();
        for bad in [
            token(&id, "anon", 3600),
            token(&id, TOKEN_AUDIENCE, -3600),
            token("not-a-uuid", TOKEN_AUDIENCE, 3600),
        ] {
            assert!(matches!(verify_token(&bad, SECRET), Err(AppError::InvalidToken)));
        }
        let good = token(&id, TOKEN_AUDIENCE, 3600);
        assert!(verify_token(&good, b"some_other_secret").is_err());
    }
}
