// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user consistency report across auth user, profile, member and roles.

use crate::db::BaasDb;
use crate::error::AppError;
use crate::models::{normalize_email, ColumnStyle, Member, Profile};
use crate::services::auth::{AuthAccount, AuthClient};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserDiagnosis {
    pub email: String,
    pub auth_user: Option<AuthAccount>,
    pub profile: Option<Profile>,
    pub member: Option<Member>,
    pub roles: Vec<String>,
    pub issues: Vec<String>,
    pub healthy: bool,
}

/// Human-readable problems with how the records for one email line up.
pub fn find_issues(
    auth_user: Option<&AuthAccount>,
    profile: Option<&Profile>,
    member: Option<&Member>,
    roles: &[String],
) -> Vec<String> {
    let mut issues = Vec::new();

    match (auth_user, profile) {
        (None, _) => issues.push("No auth user exists for this email".to_string()),
        (Some(_), None) => issues.push("Auth user has no profile row".to_string()),
        (Some(user), Some(profile)) if user.id != profile.id => {
            issues.push(format!(
                "Profile id {} does not match auth user id {}",
                profile.id, user.id
            ));
        }
        _ => {}
    }

    match (profile, member) {
        (Some(_), None) => issues.push("Profile exists but member record is missing".to_string()),
        (None, Some(_)) => issues.push("Member exists without a profile".to_string()),
        _ => {}
    }

    if let Some(member) = member {
        match (member.user_id, auth_user) {
            (None, _) => issues.push("Member is not linked to an auth user".to_string()),
            (Some(linked), Some(user)) if linked != user.id => {
                issues.push(format!("Member is linked to a different user ({})", linked));
            }
            _ => {}
        }
    }

    if auth_user.is_some() && roles.is_empty() {
        issues.push("User has no roles assigned".to_string());
    }

    issues
}

/// Gather every record for `email` and report what is inconsistent.
pub async fn diagnose_user(
    db: &BaasDb,
    auth: &AuthClient,
    style: ColumnStyle,
    email: &str,
) -> Result<UserDiagnosis, AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }

    let (auth_user, profile, mut member) = tokio::try_join!(
        auth.find_user_by_email(&email),
        db.get_profile_by_email(&email),
        db.get_member_by_email(&email),
    )?;

    let user_id = auth_user.as_ref().map(|u| u.id).or(profile.as_ref().map(|p| p.id));

    if member.is_none() {
        if let Some(id) = user_id {
            member = db.get_member_by_user_id(id, style).await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Member lookup by user id unavailable");
                None
            });
        }
    }

    let roles = match user_id {
        Some(id) => db
            .get_roles(id)
            .await?
            .into_iter()
            .map(|r| r.role)
            .collect(),
        None => Vec::new(),
    };

    let issues = find_issues(auth_user.as_ref(), profile.as_ref(), member.as_ref(), &roles);

    Ok(UserDiagnosis {
        email,
        healthy: issues.is_empty(),
        auth_user,
        profile,
        member,
        roles,
        issues,
    })
}
