// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users: own profile and the member directory.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Member, MemberUpdate, NewMember, Permission, Permissions, Profile, ProfileUpdate};
use crate::services::SyncResult;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 100;

/// API routes (require authentication).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/members", get(list_members).post(create_member))
        .route(
            "/api/members/{id}",
            get(get_member).put(update_member).delete(delete_member),
        )
}

// ─── Current User ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub profile: Option<Profile>,
    pub permissions: Permissions,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = state.db.get_profile(user.user_id).await?;
    let email = user
        .email
        .clone()
        .or_else(|| profile.as_ref().and_then(|p| p.email.clone()));
    let permissions = state
        .roles
        .permissions_for(user.user_id, email.as_deref())
        .await?;

    Ok(Json(MeResponse {
        user_id: user.user_id.to_string(),
        email,
        profile,
        permissions,
    }))
}

#[derive(Serialize)]
pub struct UpdateMeResponse {
    pub profile: Profile,
    /// How the edit was carried over to the member directory
    pub member_sync: SyncResult,
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UpdateMeResponse>> {
    update
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let patch = update.to_patch();
    if patch.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let profile = state
        .db
        .update_profile(user.user_id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Profile {}", user.user_id)))?;
    tracing::info!(user_id = %user.user_id, fields = patch.len() - 1, "Profile updated");

    let member_sync = state.sync.mirror_profile(&profile).await;
    if !member_sync.success {
        tracing::warn!(user_id = %user.user_id, message = %member_sync.message, "Profile edit not mirrored");
    }

    Ok(Json(UpdateMeResponse {
        profile,
        member_sync,
    }))
}

// ─── Member Directory ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MembersParams {
    /// Search on name or email
    pub q: Option<String>,
    pub church_unit: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MembersResponse {
    pub members: Vec<Member>,
    pub limit: usize,
    pub offset: usize,
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<MembersParams>,
) -> Result<Json<MembersResponse>> {
    user.require(&state, Permission::ViewDirectory).await?;

    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);

    // Directory reads go through the caller's own token so RLS applies
    let members = state
        .db
        .as_user(&user.access_token)
        .search_members(
            state.sync.style(),
            params.q.as_deref(),
            params.church_unit.as_deref(),
            limit,
            offset,
        )
        .await?;

    Ok(Json(MembersResponse {
        members,
        limit,
        offset,
    }))
}

async fn get_member(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Member>> {
    user.require(&state, Permission::ViewDirectory).await?;

    let member = state
        .db
        .as_user(&user.access_token)
        .get_member(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {}", id)))?;
    Ok(Json(member))
}

async fn create_member(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(mut new_member): Json<NewMember>,
) -> Result<(StatusCode, Json<Member>)> {
    user.require(&state, Permission::ManageMembers).await?;
    new_member
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    new_member.email = crate::models::normalize_email(&new_member.email);

    if state.db.get_member_by_email(&new_member.email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "A member with email {} already exists",
            new_member.email
        )));
    }

    let member = state.sync.insert_member(&new_member).await?;
    tracing::info!(member_id = %member.id, by = %user.user_id, "Member created");
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<MemberUpdate>,
) -> Result<Json<Member>> {
    user.require(&state, Permission::ManageMembers).await?;
    update
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let member = state
        .sync
        .update_member(&id, &update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {}", id)))?;
    tracing::info!(member_id = %member.id, by = %user.user_id, "Member updated");
    Ok(Json(member))
}

async fn delete_member(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    user.require(&state, Permission::ManageMembers).await?;

    if !state.db.delete_member(&id).await? {
        return Err(AppError::NotFound(format!("Member {}", id)));
    }
    tracing::info!(member_id = %id, by = %user.user_id, "Member deleted");
    Ok(StatusCode::NO_CONTENT)
}
