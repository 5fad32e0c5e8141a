// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Roles and the permission flags derived from them.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Application role as stored in `user_roles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AppRole {
    SuperAdmin,
    Admin,
    Pastor,
    Worker,
    Member,
}

impl AppRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AppRole::SuperAdmin => "super_admin",
            AppRole::Admin => "admin",
            AppRole::Pastor => "pastor",
            AppRole::Worker => "worker",
            AppRole::Member => "member",
        }
    }
}

impl std::fmt::Display for AppRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "superuser" and "super-admin" appear in older rows
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "super_admin" | "superadmin" | "superuser" => Ok(AppRole::SuperAdmin),
            "admin" => Ok(AppRole::Admin),
            "pastor" => Ok(AppRole::Pastor),
            "worker" => Ok(AppRole::Worker),
            "member" | "user" => Ok(AppRole::Member),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Row in the `user_roles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub user_id: Uuid,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserRole {
    pub fn new(user_id: Uuid, role: AppRole) -> Self {
        Self {
            id: None,
            user_id,
            role: role.as_str().to_string(),
            created_at: None,
        }
    }
}

/// Parse role rows, dropping (and logging) values we do not recognise.
pub fn parse_roles(rows: &[UserRole]) -> Vec<AppRole> {
    let mut roles: Vec<AppRole> = rows
        .iter()
        .filter_map(|r| match r.role.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                tracing::warn!(user_id = %r.user_id, error = %e, "Ignoring unrecognised role");
                None
            }
        })
        .collect();
    roles.sort();
    roles.dedup();
    roles
}

/// A single capability checked by route handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewDirectory,
    AccessAdmin,
    ManageMembers,
    ManageContent,
    ManageRoles,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Permission::ViewDirectory => "view the member directory",
            Permission::AccessAdmin => "access the admin dashboard",
            Permission::ManageMembers => "manage members",
            Permission::ManageContent => "manage events, sermons and announcements",
            Permission::ManageRoles => "manage roles",
        };
        f.write_str(name)
    }
}

/// Flags derived from a user's roles, as consumed by the frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Permissions {
    pub roles: Vec<AppRole>,
    pub is_super_admin: bool,
    pub is_admin: bool,
    pub can_manage_roles: bool,
    pub can_manage_members: bool,
    pub can_manage_content: bool,
    pub can_access_admin: bool,
    pub can_view_directory: bool,
}

impl Permissions {
    /// Derive flags from roles. Emails in `super_admin_emails` (lower-cased)
    /// are super admins regardless of their role rows.
    pub fn derive(roles: &[AppRole], email: Option<&str>, super_admin_emails: &[String]) -> Self {
        let has = |r: AppRole| roles.contains(&r);

        let listed = email
            .map(|e| e.trim().to_lowercase())
            .is_some_and(|e| super_admin_emails.iter().any(|s| *s == e));

        let is_super_admin = listed || has(AppRole::SuperAdmin);
        let is_admin = is_super_admin || has(AppRole::Admin);
        let can_manage_content = is_admin || has(AppRole::Pastor);
        let can_access_admin = can_manage_content || has(AppRole::Worker);

        let mut roles = roles.to_vec();
        if listed && !roles.contains(&AppRole::SuperAdmin) {
            roles.insert(0, AppRole::SuperAdmin);
        }

        Self {
            can_view_directory: can_access_admin || !roles.is_empty(),
            roles,
            is_super_admin,
            is_admin,
            can_manage_roles: is_super_admin,
            can_manage_members: is_admin,
            can_manage_content,
            can_access_admin,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ViewDirectory => self.can_view_directory,
            Permission::AccessAdmin => self.can_access_admin,
            Permission::ManageMembers => self.can_manage_members,
            Permission::ManageContent => self.can_manage_content,
            Permission::ManageRoles => self.can_manage_roles,
        }
    }
}
