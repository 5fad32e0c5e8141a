// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Table API client with typed operations.
//!
//! Provides generic CRUD against `<url>/rest/v1/<table>` plus high-level
//! operations for:
//! - Profiles (auth-linked user records)
//! - Members (congregant records)
//! - User roles
//! - Content tables (events, sermons, announcements)

use crate::db::query::{sanitize_search, Query};
use crate::db::tables;
use crate::error::{AppError, BaasError};
use crate::models::{ColumnStyle, Member, Profile, Row, UserRole};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Rows fetched per request when reading a whole table.
pub const PAGE_SIZE: usize = 1000;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the shared HTTP client used for every BaaS call.
pub fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}

#[derive(Clone)]
struct RestClient {
    http: reqwest::Client,
    rest_url: String,
    anon_key: String,
    api_key: String,
    bearer: String,
}

/// Table API client.
///
/// The credential it carries decides what row-level security lets through:
/// the service-role key sees everything, a user's access token sees what the
/// policies allow that user to see.
#[derive(Clone)]
pub struct BaasDb {
    client: Option<RestClient>,
}

impl BaasDb {
    /// Create a client authenticated with the service-role key.
    pub fn service_role(
        http: reqwest::Client,
        base_url: &str,
        anon_key: &str,
        service_role_key: &str,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        tracing::debug!(url = base, "Table API client ready (service role)");
        Self {
            client: Some(RestClient {
                http,
                rest_url: format!("{}/rest/v1", base),
                anon_key: anon_key.to_string(),
                api_key: service_role_key.to_string(),
                bearer: service_role_key.to_string(),
            }),
        }
    }

    /// Derive a client that acts as the user owning `access_token`.
    pub fn as_user(&self, access_token: &str) -> Self {
        Self {
            client: self.client.as_ref().map(|c| RestClient {
                api_key: c.anon_key.clone(),
                bearer: access_token.to_string(),
                ..c.clone()
            }),
        }
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&RestClient, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    fn request(&self, method: Method, path: &str, query: &Query) -> Result<RequestBuilder, AppError> {
        let client = self.get_client()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&client.api_key)
                .map_err(|_| AppError::Database("API key is not a valid header value".into()))?,
        );

        Ok(client
            .http
            .request(method, format!("{}/{}", client.rest_url, path))
            .headers(headers)
            .bearer_auth(&client.bearer)
            .query(query.params()))
    }

    // ─── Generic Operations ─────────────────────────────────────

    /// Select rows matching `query`.
    pub async fn select<T: DeserializeOwned>(&self, table: &str, query: &Query) -> Result<Vec<T>, AppError> {
        let response = self
            .request(Method::GET, table, query)?
            .send()
            .await
            .map_err(BaasError::transport)?;
        parse_json(response).await
    }

    /// Select at most one row.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Option<T>, AppError> {
        let rows = self.select(table, &query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// Select every matching row, `PAGE_SIZE` rows per request.
    ///
    /// `query` should carry an `order` so pages are stable.
    pub async fn select_all<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, AppError> {
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page: Vec<T> = self
                .select(table, &query.clone().limit(PAGE_SIZE).offset(offset))
                .await?;
            let len = page.len();
            all.extend(page);
            if len < PAGE_SIZE {
                break;
            }
            offset += len;
        }
        Ok(all)
    }

    /// Count matching rows without transferring them.
    pub async fn count(&self, table: &str, query: &Query) -> Result<u64, AppError> {
        let response = self
            .request(Method::HEAD, table, &query.clone().select("*"))?
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(BaasError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(BaasError::from_body(status.as_u16(), "").into());
        }

        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| AppError::Database(format!("No row count returned for {}", table)))
    }

    /// Insert one row (object) or many (array); returns the stored rows.
    pub async fn insert<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<R>, AppError> {
        let response = self
            .request(Method::POST, table, &Query::new())?
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(BaasError::transport)?;
        parse_json(response).await
    }

    /// Insert or merge on the `on_conflict` column(s).
    pub async fn upsert<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        on_conflict: &str,
    ) -> Result<Vec<R>, AppError> {
        let query = Query::new();
        let response = self
            .request(Method::POST, table, &query)?
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(body)
            .send()
            .await
            .map_err(BaasError::transport)?;
        parse_json(response).await
    }

    /// Patch rows matching `query`; returns the updated rows.
    pub async fn update<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
        patch: &B,
    ) -> Result<Vec<R>, AppError> {
        let response = self
            .request(Method::PATCH, table, query)?
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .map_err(BaasError::transport)?;
        parse_json(response).await
    }

    /// Delete rows matching `query`; returns how many went away.
    pub async fn delete(&self, table: &str, query: &Query) -> Result<usize, AppError> {
        if query.params().is_empty() {
            return Err(AppError::BadRequest(format!(
                "Refusing unfiltered delete on {}",
                table
            )));
        }

        let response = self
            .request(Method::DELETE, table, query)?
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(BaasError::transport)?;
        let deleted: Vec<serde_json::Value> = parse_json(response).await?;
        Ok(deleted.len())
    }

    /// Call a server-side SQL function.
    pub async fn rpc<A: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        function: &str,
        args: &A,
    ) -> Result<R, AppError> {
        let response = self
            .request(Method::POST, &format!("rpc/{}", function), &Query::new())?
            .json(args)
            .send()
            .await
            .map_err(BaasError::transport)?;
        parse_json(response).await
    }

    // ─── Profile Operations ─────────────────────────────────────

    pub async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        self.select_one(tables::PROFILES, &Query::new().select("*").eq("id", id))
            .await
    }

    /// Case-insensitive lookup by email.
    pub async fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        self.select_one(
            tables::PROFILES,
            &Query::new().select("*").eq_ignore_case("email", email),
        )
        .await
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        self.select_all(tables::PROFILES, &Query::new().select("*").order("id", true))
            .await
    }

    /// Create the profile or merge into the existing one with the same id.
    pub async fn upsert_profile(&self, row: &Row) -> Result<Option<Profile>, AppError> {
        let rows: Vec<Profile> = self.upsert(tables::PROFILES, row, "id").await?;
        Ok(rows.into_iter().next())
    }

    pub async fn update_profile(&self, id: Uuid, patch: &Row) -> Result<Option<Profile>, AppError> {
        let rows: Vec<Profile> = self
            .update(tables::PROFILES, &Query::new().eq("id", id), patch)
            .await?;
        Ok(rows.into_iter().next())
    }

    // ─── Member Operations ──────────────────────────────────────

    pub async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        self.select_one(tables::MEMBERS, &Query::new().select("*").eq("id", id))
            .await
    }

    /// Case-insensitive lookup by email. With duplicate rows, linked rows
    /// come first.
    pub async fn get_member_by_email(&self, email: &str) -> Result<Option<Member>, AppError> {
        Ok(self.find_members_by_email(email).await?.into_iter().next())
    }

    /// Every member row with this email, linked rows first, then by id.
    pub async fn find_members_by_email(&self, email: &str) -> Result<Vec<Member>, AppError> {
        let rows: Vec<Row> = self
            .select(
                tables::MEMBERS,
                &Query::new()
                    .select("*")
                    .eq_ignore_case("email", email)
                    .order("id", true),
            )
            .await?;
        let mut members = decode_members(rows);
        // Column spelling varies, so link order is applied here
        members.sort_by_key(|m| m.user_id.is_none());
        Ok(members)
    }

    pub async fn get_member_by_user_id(
        &self,
        user_id: Uuid,
        style: ColumnStyle,
    ) -> Result<Option<Member>, AppError> {
        self.select_one(
            tables::MEMBERS,
            &Query::new().select("*").eq(style.user_id(), user_id),
        )
        .await
    }

    /// Whole members table. Rows that cannot be decoded are skipped.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        let rows: Vec<Row> = self
            .select_all(tables::MEMBERS, &Query::new().select("*").order("id", true))
            .await?;
        Ok(decode_members(rows))
    }

    /// Directory search on name/email with an optional church unit filter.
    pub async fn search_members(
        &self,
        style: ColumnStyle,
        search: Option<&str>,
        church_unit: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Member>, AppError> {
        let mut query = Query::new()
            .select("*")
            .order(style.full_name(), true)
            .limit(limit)
            .offset(offset);

        if let Some(term) = search.map(sanitize_search).filter(|t| !t.is_empty()) {
            query = query.or(&format!(
                "{}.ilike.*{}*,email.ilike.*{}*",
                style.full_name(),
                term,
                term
            ));
        }
        if let Some(unit) = church_unit.filter(|u| !u.trim().is_empty()) {
            query = query.eq_ignore_case(style.church_unit(), unit.trim());
        }

        let rows: Vec<Row> = self.select(tables::MEMBERS, &query).await?;
        Ok(decode_members(rows))
    }

    pub async fn insert_member(&self, row: &Row) -> Result<Member, AppError> {
        let rows: Vec<Member> = self.insert(tables::MEMBERS, row).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Database("Insert returned no member row".to_string()))
    }

    pub async fn insert_members(&self, rows: &[Row]) -> Result<Vec<Member>, AppError> {
        self.insert(tables::MEMBERS, rows).await
    }

    pub async fn update_member(&self, id: &str, patch: &Row) -> Result<Option<Member>, AppError> {
        let rows: Vec<Member> = self
            .update(tables::MEMBERS, &Query::new().eq("id", id), patch)
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn delete_member(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.delete(tables::MEMBERS, &Query::new().eq("id", id)).await? > 0)
    }

    // ─── Role Operations ────────────────────────────────────────

    pub async fn get_roles(&self, user_id: Uuid) -> Result<Vec<UserRole>, AppError> {
        self.select(
            tables::USER_ROLES,
            &Query::new().select("*").eq("user_id", user_id),
        )
        .await
    }

    pub async fn insert_role(&self, role: &UserRole) -> Result<(), AppError> {
        let _: Vec<serde_json::Value> = self.insert(tables::USER_ROLES, role).await?;
        Ok(())
    }

    pub async fn delete_role(&self, user_id: Uuid, role: &str) -> Result<usize, AppError> {
        self.delete(
            tables::USER_ROLES,
            &Query::new().eq("user_id", user_id).eq("role", role),
        )
        .await
    }

    // ─── Content Operations ─────────────────────────────────────

    /// Newest-first listing of a content table.
    pub async fn list_content<T: DeserializeOwned>(
        &self,
        table: &str,
        order_column: &str,
        limit: usize,
    ) -> Result<Vec<T>, AppError> {
        self.select(
            table,
            &Query::new()
                .select("*")
                .order(order_column, false)
                .limit(limit),
        )
        .await
    }

    pub async fn insert_content<B: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<R, AppError> {
        let rows: Vec<R> = self.insert(table, body).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Database(format!("Insert into {} returned no row", table)))
    }

    pub async fn delete_content(&self, table: &str, id: &str) -> Result<bool, AppError> {
        Ok(self.delete(table, &Query::new().eq("id", id)).await? > 0)
    }
}

/// Check the status and parse a JSON body.
/// Decode member rows one by one so a single malformed row (say, a legacy
/// non-uuid `user_id`) does not sink the whole read.
fn decode_members(rows: Vec<Row>) -> Vec<Member> {
    rows.into_iter()
        .filter_map(|row| match Member::try_from(row) {
            Ok(member) => Some(member),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable member row");
                None
            }
        })
        .collect()
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = BaasError::from_body(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), code = ?err.code, "Table API request failed");
        return Err(err.into());
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Database(format!("JSON parse error: {}", e)))
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit('/').next()?.trim().parse().ok()
}
