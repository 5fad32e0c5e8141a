// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Management API client, used to run SQL (policies, functions, fixes)
//! against the project database.

use crate::config::Config;
use crate::error::{AppError, BaasError};

const MANAGEMENT_API_URL: &str = "https://api.supabase.com/v1";

#[derive(Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    project_ref: String,
}

impl ManagementClient {
    /// Build from config; fails when the management token or project ref is missing.
    pub fn from_config(http: reqwest::Client, config: &Config) -> Result<Self, AppError> {
        let token = config.management_token.clone().ok_or_else(|| {
            AppError::BadRequest("SUPABASE_ACCESS_TOKEN is not set".to_string())
        })?;
        let project_ref = config.project_ref().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Cannot derive project ref from {}",
                config.supabase_url
            ))
        })?;
        Ok(Self::new(http, MANAGEMENT_API_URL, &token, &project_ref))
    }

    pub fn new(http: reqwest::Client, api_url: &str, token: &str, project_ref: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            project_ref: project_ref.to_string(),
        }
    }

    /// Execute SQL and return whatever rows it produced.
    pub async fn run_sql(&self, sql: &str) -> Result<serde_json::Value, AppError> {
        if sql.trim().is_empty() {
            return Err(AppError::BadRequest("SQL is empty".to_string()));
        }

        let url = format!("{}/projects/{}/database/query", self.api_url, self.project_ref);
        tracing::info!(project = %self.project_ref, bytes = sql.len(), "Running SQL via management API");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "query": sql }))
            .send()
            .await
            .map_err(BaasError::transport)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BaasError::from_body(status.as_u16(), &body).into());
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Management API parse error: {}", e)))
    }
}
