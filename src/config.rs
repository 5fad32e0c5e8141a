// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The BaaS hands out three key tiers with increasing access: the anon key,
//! the service-role key and the management API token. Only the first two are
//! required; the management token is needed for applying SQL files.

use crate::models::ColumnStyle;
use std::env;

/// Default number of member rows inserted per request during bulk sync.
pub const DEFAULT_SYNC_CHUNK_SIZE: usize = 50;
/// Upper bound accepted for `SYNC_CHUNK_SIZE`.
pub const MAX_SYNC_CHUNK_SIZE: usize = 500;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- BaaS endpoint and keys ---
    /// Base URL of the BaaS project, e.g. `https://abcd.supabase.co`
    pub supabase_url: String,
    /// Anonymous (public) key
    pub anon_key: String,
    /// Service-role key; bypasses row-level security
    pub service_role_key: String,
    /// Management API token (optional)
    pub management_token: Option<String>,
    /// Shared secret used to sign user access tokens (optional).
    /// Without it, tokens are verified by asking the auth server.
    pub jwt_secret: Option<Vec<u8>>,

    // --- Server ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,

    // --- Reconciliation ---
    /// Emails that are always treated as super admins (lower-cased)
    pub super_admin_emails: Vec<String>,
    /// Spelling of member table columns when writing
    pub member_column_style: ColumnStyle,
    /// Bulk sync insert chunk size
    pub sync_chunk_size: usize,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let supabase_url = required("SUPABASE_URL")?
            .trim_end_matches('/')
            .to_string();

        let member_column_style = match env::var("MEMBER_COLUMN_STYLE") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("MEMBER_COLUMN_STYLE", raw))?,
            Err(_) => ColumnStyle::default(),
        };

        let sync_chunk_size = match env::var("SYNC_CHUNK_SIZE") {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if (1..=MAX_SYNC_CHUNK_SIZE).contains(&n) => n,
                _ => return Err(ConfigError::Invalid("SYNC_CHUNK_SIZE", raw)),
            },
            Err(_) => DEFAULT_SYNC_CHUNK_SIZE,
        };

        Ok(Self {
            supabase_url,
            anon_key: required("SUPABASE_ANON_KEY")?,
            service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            management_token: optional("SUPABASE_ACCESS_TOKEN"),
            jwt_secret: optional("SUPABASE_JWT_SECRET").map(String::into_bytes),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            super_admin_emails: parse_email_list(
                &env::var("SUPER_ADMIN_EMAILS").unwrap_or_default(),
            ),
            member_column_style,
            sync_chunk_size,
        })
    }

    /// Config for tests; points at an unroutable BaaS.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:9".to_string(),
            anon_key: "test_anon_key".to_string(),
            service_role_key: "test_service_role_key".to_string(),
            management_token: None,
            jwt_secret: Some(b"test_jwt_secret_32_bytes_minimum!".to_vec()),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            super_admin_emails: vec!["root@church.test".to_string()],
            member_column_style: ColumnStyle::Snake,
            sync_chunk_size: DEFAULT_SYNC_CHUNK_SIZE,
        }
    }

    /// Project reference used by the management API, taken from the first
    /// label of the BaaS host (`https://<ref>.supabase.co`).
    pub fn project_ref(&self) -> Option<String> {
        let host = self
            .supabase_url
            .split("://")
            .nth(1)?
            .split(['/', ':'])
            .next()?;
        let label = host.split('.').next()?;
        if label.is_empty() || host == label {
            None
        } else {
            Some(label.to_string())
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated email list, normalizing case and whitespace.
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
