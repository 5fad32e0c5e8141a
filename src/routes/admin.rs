// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin dashboard routes: counts, reconciliation and role management.

use crate::db::{tables, Query as DbQuery};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{AppRole, Permission};
use crate::services::{diagnose_user, ConsolidationReport, SyncReport, SyncResult, UserDiagnosis};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/sync", post(sync_all))
        .route("/api/admin/sync/{email}", post(sync_user))
        .route("/api/admin/consolidate", post(consolidate))
        .route("/api/admin/diagnose/{email}", get(diagnose))
        .route("/api/admin/roles", post(assign_role).delete(remove_role))
        .route("/api/admin/roles/{user_id}", get(list_roles))
}

// ─── Dashboard ───────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsResponse {
    /// Row count per table
    pub counts: BTreeMap<String, u64>,
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatsResponse>> {
    user.require(&state, Permission::AccessAdmin).await?;

    let counts = try_join_all(tables::DASHBOARD.into_iter().map(|table| {
        let db = state.db.clone();
        async move {
            let n = db.count(table, &DbQuery::new()).await?;
            Ok::<_, AppError>((table.to_string(), n))
        }
    }))
    .await?;

    Ok(Json(StatsResponse {
        counts: counts.into_iter().collect(),
    }))
}

// ─── Reconciliation ──────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct DryRunParams {
    #[serde(default)]
    pub dry_run: bool,
}

async fn sync_all(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DryRunParams>,
) -> Result<Json<SyncReport>> {
    user.require(&state, Permission::ManageMembers).await?;
    tracing::info!(by = %user.user_id, dry_run = params.dry_run, "Bulk member sync requested");
    Ok(Json(state.sync.sync_profiles_to_members(params.dry_run).await))
}

async fn sync_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(email): Path<String>,
) -> Result<Json<SyncResult>> {
    user.require(&state, Permission::ManageMembers).await?;
    Ok(Json(state.sync.sync_specific_user(&email).await))
}

async fn consolidate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<DryRunParams>,
) -> Result<Json<ConsolidationReport>> {
    user.require(&state, Permission::ManageMembers).await?;
    tracing::info!(by = %user.user_id, dry_run = params.dry_run, "Member consolidation requested");
    Ok(Json(state.sync.consolidate_members(params.dry_run).await))
}

async fn diagnose(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(email): Path<String>,
) -> Result<Json<UserDiagnosis>> {
    user.require(&state, Permission::ManageMembers).await?;
    let report = diagnose_user(&state.db, &state.auth, state.sync.style(), &email).await?;
    Ok(Json(report))
}

// ─── Roles ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RolesResponse {
    pub user_id: Uuid,
    pub roles: Vec<AppRole>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub user_id: Uuid,
    pub role: String,
}

impl RoleRequest {
    fn parsed_role(&self) -> Result<AppRole> {
        self.role.parse().map_err(AppError::BadRequest)
    }
}

#[derive(Serialize)]
pub struct RoleChangeResponse {
    pub user_id: Uuid,
    pub role: AppRole,
    /// False when the request changed nothing
    pub changed: bool,
}

async fn list_roles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RolesResponse>> {
    user.require(&state, Permission::ManageRoles).await?;
    let roles = state.roles.roles_for(user_id).await?;
    Ok(Json(RolesResponse { user_id, roles }))
}

async fn assign_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<RoleChangeResponse>> {
    user.require(&state, Permission::ManageRoles).await?;
    let role = req.parsed_role()?;

    let changed = state.roles.assign_role(req.user_id, role).await?;
    tracing::info!(target_user = %req.user_id, %role, by = %user.user_id, changed, "Role assign");
    Ok(Json(RoleChangeResponse {
        user_id: req.user_id,
        role,
        changed,
    }))
}

async fn remove_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<RoleChangeResponse>> {
    user.require(&state, Permission::ManageRoles).await?;
    let role = req.parsed_role()?;

    if req.user_id == user.user_id && role == AppRole::SuperAdmin {
        return Err(AppError::BadRequest(
            "Super admins cannot remove their own super_admin role".to_string(),
        ));
    }

    let changed = state.roles.remove_role(req.user_id, role).await?;
    tracing::info!(target_user = %req.user_id, %role, by = %user.user_id, changed, "Role remove");
    Ok(Json(RoleChangeResponse {
        user_id: req.user_id,
        role,
        changed,
    }))
}
