// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Events, sermons and announcements.
//!
//! The three tables are handled identically: anyone signed in can read,
//! content managers can create and delete.

use crate::db::tables;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Announcement, Event, NewAnnouncement, NewEvent, NewSermon, Permission, Sermon};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;

/// A content table with its row and input types.
pub trait ContentKind: Send + Sync + 'static {
    const TABLE: &'static str;
    /// Column listings are ordered by, newest first
    const ORDER_BY: &'static str;
    type Item: Serialize + DeserializeOwned + Send + Sync + 'static;
    type Input: Serialize + DeserializeOwned + Validate + Send + Sync + 'static;
}

pub struct Events;
pub struct Sermons;
pub struct Announcements;

impl ContentKind for Events {
    const TABLE: &'static str = tables::EVENTS;
    const ORDER_BY: &'static str = "event_date";
    type Item = Event;
    type Input = NewEvent;
}

impl ContentKind for Sermons {
    const TABLE: &'static str = tables::SERMONS;
    const ORDER_BY: &'static str = "sermon_date";
    type Item = Sermon;
    type Input = NewSermon;
}

impl ContentKind for Announcements {
    const TABLE: &'static str = tables::ANNOUNCEMENTS;
    const ORDER_BY: &'static str = "created_at";
    type Item = Announcement;
    type Input = NewAnnouncement;
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/events", get(list::<Events>).post(create::<Events>))
        .route("/api/events/{id}", delete(remove::<Events>))
        .route("/api/sermons", get(list::<Sermons>).post(create::<Sermons>))
        .route("/api/sermons/{id}", delete(remove::<Sermons>))
        .route(
            "/api/announcements",
            get(list::<Announcements>).post(create::<Announcements>),
        )
        .route("/api/announcements/{id}", delete(remove::<Announcements>))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

async fn list<K: ContentKind>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<K::Item>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let items = state
        .db
        .as_user(&user.access_token)
        .list_content(K::TABLE, K::ORDER_BY, limit)
        .await?;
    Ok(Json(items))
}

async fn create<K: ContentKind>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<K::Input>,
) -> Result<(StatusCode, Json<K::Item>)> {
    user.require(&state, Permission::ManageContent).await?;
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let item = state.db.insert_content(K::TABLE, &input).await?;
    tracing::info!(table = K::TABLE, by = %user.user_id, "Content created");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn remove<K: ContentKind>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    user.require(&state, Permission::ManageContent).await?;

    if !state.db.delete_content(K::TABLE, &id).await? {
        return Err(AppError::NotFound(format!("{} {}", K::TABLE, id)));
    }
    tracing::info!(table = K::TABLE, id = %id, by = %user.user_id, "Content deleted");
    Ok(StatusCode::NO_CONTENT)
}
