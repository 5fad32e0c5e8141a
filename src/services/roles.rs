// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role assignment and permission checks.
//!
//! Permissions are derived from `user_roles` rows and cached per user for a
//! short time, so a burst of requests from one admin page does not re-read
//! the roles table every time.

use crate::db::BaasDb;
use crate::error::AppError;
use crate::models::role::parse_roles;
use crate::models::{normalize_email, AppRole, Permission, Permissions, Row, UserRole};
use crate::services::auth::AuthClient;
use crate::services::sync::SyncResult;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// How long derived permissions are reused.
const PERMISSION_CACHE_TTL_SECS: i64 = 60;

#[derive(Clone)]
pub struct CachedPermissions {
    permissions: Permissions,
    fetched_at: DateTime<Utc>,
}

/// Shared permission cache type.
pub type PermissionCache = Arc<DashMap<Uuid, CachedPermissions>>;

#[derive(Clone)]
pub struct RoleService {
    db: BaasDb,
    super_admin_emails: Vec<String>,
    cache: PermissionCache,
}

impl RoleService {
    pub fn new(db: BaasDb, super_admin_emails: Vec<String>) -> Self {
        Self {
            db,
            super_admin_emails,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Recognised roles of a user.
    pub async fn roles_for(&self, user_id: Uuid) -> Result<Vec<AppRole>, AppError> {
        let rows = self.db.get_roles(user_id).await?;
        Ok(parse_roles(&rows))
    }

    /// Derived permissions, from cache when fresh.
    pub async fn permissions_for(
        &self,
        user_id: Uuid,
        email: Option<&str>,
    ) -> Result<Permissions, AppError> {
        let now = Utc::now();
        if let Some(cached) = self.cache.get(&user_id) {
            if now - cached.fetched_at < Duration::seconds(PERMISSION_CACHE_TTL_SECS) {
                return Ok(cached.permissions.clone());
            }
        }

        let roles = self.roles_for(user_id).await?;
        let permissions = Permissions::derive(&roles, email, &self.super_admin_emails);

        self.cache.insert(
            user_id,
            CachedPermissions {
                permissions: permissions.clone(),
                fetched_at: now,
            },
        );
        Ok(permissions)
    }

    /// Fail with `Forbidden` unless the user holds `permission`.
    pub async fn require(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        permission: Permission,
    ) -> Result<Permissions, AppError> {
        let permissions = self.permissions_for(user_id, email).await?;
        if permissions.allows(permission) {
            Ok(permissions)
        } else {
            tracing::info!(user_id = %user_id, %permission, "Permission denied");
            Err(AppError::Forbidden(format!("You are not allowed to {}", permission)))
        }
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.cache.remove(&user_id);
    }

    /// Give a user a role. Returns `false` when they already had it.
    pub async fn assign_role(&self, user_id: Uuid, role: AppRole) -> Result<bool, AppError> {
        let current = self.roles_for(user_id).await?;
        if current.contains(&role) {
            return Ok(false);
        }

        match self.db.insert_role(&UserRole::new(user_id, role)).await {
            Ok(()) => {}
            // Lost a race with another grant of the same role
            Err(e) if e.is_unique_violation() => return Ok(false),
            Err(e) => return Err(e),
        }

        self.invalidate(user_id);
        tracing::info!(user_id = %user_id, %role, "Role assigned");
        Ok(true)
    }

    /// Take a role away. Returns `false` when the user did not have it.
    pub async fn remove_role(&self, user_id: Uuid, role: AppRole) -> Result<bool, AppError> {
        let removed = self.db.delete_role(user_id, role.as_str()).await?;
        self.invalidate(user_id);
        if removed > 0 {
            tracing::info!(user_id = %user_id, %role, "Role removed");
        }
        Ok(removed > 0)
    }

    /// Grant a role to the auth user with this email, creating their profile
    /// row first when it is missing.
    pub async fn grant_role_by_email(
        &self,
        auth: &AuthClient,
        email: &str,
        role: AppRole,
    ) -> SyncResult {
        let email = normalize_email(email);
        let user = match auth.find_user_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => return SyncResult::failed(format!("No auth user found for {}", email)),
            Err(e) => {
                return SyncResult::failed(format!(
                    "Failed to look up auth user {}: {}",
                    email,
                    e.user_message()
                ))
            }
        };

        match self.db.get_profile(user.id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                let mut row = Row::new();
                row.insert("id".into(), user.id.to_string().into());
                row.insert("email".into(), email.clone().into());
                if let Some(name) = user.full_name() {
                    row.insert("full_name".into(), name.into());
                }
                if let Err(e) = self.db.upsert_profile(&row).await {
                    return SyncResult::failed(format!(
                        "Failed to create profile for {}: {}",
                        email,
                        e.user_message()
                    ));
                }
                tracing::info!(user_id = %user.id, "Created missing profile");
            }
            Err(e) => {
                return SyncResult::failed(format!(
                    "Failed to look up profile for {}: {}",
                    email,
                    e.user_message()
                ))
            }
        }

        match self.assign_role(user.id, role).await {
            Ok(true) => SyncResult::ok(format!("Granted {} to {}", role, email)),
            Ok(false) => SyncResult::ok(format!("{} already has {}", email, role)),
            Err(e) => SyncResult::failed(format!(
                "Failed to grant {} to {}: {}",
                role,
                email,
                e.user_message()
            )),
        }
    }

    /// Make the auth user with this email a super admin.
    pub async fn grant_super_admin(&self, auth: &AuthClient, email: &str) -> SyncResult {
        self.grant_role_by_email(auth, email, AppRole::SuperAdmin).await
    }

    /// Remove a role from the auth user with this email.
    pub async fn revoke_role_by_email(
        &self,
        auth: &AuthClient,
        email: &str,
        role: AppRole,
    ) -> SyncResult {
        let email = normalize_email(email);
        let user = match auth.find_user_by_email(&email).await {
            Ok(Some(user)) => user,
            Ok(None) => return SyncResult::failed(format!("No auth user found for {}", email)),
            Err(e) => return SyncResult::failed(e.user_message()),
        };

        match self.remove_role(user.id, role).await {
            Ok(true) => SyncResult::ok(format!("Removed {} from {}", role, email)),
            Ok(false) => SyncResult::ok(format!("{} did not have {}", email, role)),
            Err(e) => SyncResult::failed(e.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_cache_entry_skips_database() {
        // Offline database: any read would fail
        let service = RoleService::new(BaasDb::new_mock(), vec![]);
        let user_id = Uuid::new_v4();
        let permissions = Permissions::derive(&[AppRole::Admin], None, &[]);
        service.cache.insert(
            user_id,
            CachedPermissions {
                permissions: permissions.clone(),
                fetched_at: Utc::now(),
            },
        );

        let got = service.permissions_for(user_id, None).await.unwrap();
        assert_eq!(got, permissions);

        let err = service
            .require(user_id, None, Permission::ManageRoles)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_refetched() {
        let service = RoleService::new(BaasDb::new_mock(), vec![]);
        let user_id = Uuid::new_v4();
        service.cache.insert(
            user_id,
            CachedPermissions {
                permissions: Permissions::default(),
                fetched_at: Utc::now() - Duration::seconds(PERMISSION_CACHE_TTL_SECS + 1),
            },
        );

        assert!(service.permissions_for(user_id, None).await.is_err());
    }
}
