// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile → member reconciliation.
//!
//! Every member is meant to mirror a profile. Nothing in the database keeps
//! them in step, so these operations repair drift after the fact:
//! - `sync_specific_user`: one email, check-then-insert
//! - `sync_profiles_to_members`: every profile, fixed-size insert chunks
//! - `consolidate_members`: fold duplicate member rows into one
//!
//! There is no locking. Two concurrent syncs for the same email can both see
//! "no member" and both insert; consolidation cleans that up afterwards.

use crate::db::BaasDb;
use crate::error::AppError;
use crate::models::{normalize_email, ColumnStyle, Member, MemberUpdate, NewMember, Profile, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Outcome of a single reconciliation, in the flat shape callers print or show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
}

impl SyncResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Outcome of a bulk profile → member sync.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncReport {
    pub success: bool,
    pub message: String,
    pub dry_run: bool,
    pub total_profiles: usize,
    pub already_synced: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl SyncReport {
    fn aborted(message: String, dry_run: bool) -> Self {
        Self {
            success: false,
            message,
            dry_run,
            ..Default::default()
        }
    }
}

/// What a bulk sync would do, computed without touching the database.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub to_create: Vec<NewMember>,
    pub already_synced: usize,
    pub skipped: usize,
}

/// Decide which profiles still need a member row.
///
/// A profile is already synced when a member carries its email or its id.
/// Profiles without an email are skipped, as are repeats of an email
/// already scheduled for creation.
pub fn plan_sync(profiles: &[Profile], members: &[Member]) -> SyncPlan {
    let member_emails: HashSet<String> =
        members.iter().filter_map(Member::normalized_email).collect();
    let member_users: HashSet<uuid::Uuid> = members.iter().filter_map(|m| m.user_id).collect();

    let mut plan = SyncPlan::default();
    let mut scheduled = HashSet::new();

    for profile in profiles {
        let Some(new_member) = NewMember::from_profile(profile) else {
            plan.skipped += 1;
            continue;
        };

        if member_emails.contains(&new_member.email) || member_users.contains(&profile.id) {
            plan.already_synced += 1;
        } else if !scheduled.insert(new_member.email.clone()) {
            plan.skipped += 1;
        } else {
            plan.to_create.push(new_member);
        }
    }

    plan
}

/// A set of member rows sharing one email.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub email: String,
    pub keeper: Member,
    pub duplicates: Vec<Member>,
    /// Keeper fields to fill from the duplicates
    pub fill: MemberUpdate,
}

/// Outcome of member consolidation.
#[derive(Debug, Clone, Default, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConsolidationReport {
    pub success: bool,
    pub message: String,
    pub dry_run: bool,
    pub duplicate_groups: usize,
    pub merged: usize,
    pub deleted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Preferred keeper first: linked to a user, then oldest, then lowest id.
fn keeper_order(a: &Member, b: &Member) -> Ordering {
    a.user_id
        .is_none()
        .cmp(&b.user_id.is_none())
        .then_with(|| match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| match (a.id.parse::<i64>(), b.id.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.id.cmp(&b.id),
        })
}

/// The row to reconcile against among members sharing an email: the one
/// linked to `user_id`, else an unlinked one, else whatever is left.
pub fn pick_member(candidates: Vec<Member>, user_id: uuid::Uuid) -> Option<Member> {
    candidates.into_iter().min_by_key(|m| match m.user_id {
        Some(id) if id == user_id => 0,
        None => 1,
        Some(_) => 2,
    })
}

/// First value among `others` for a field the keeper lacks.
fn fill_from(
    own: &Option<String>,
    others: &[Member],
    get: fn(&Member) -> &Option<String>,
) -> Option<String> {
    if own.is_some() {
        return None;
    }
    others.iter().find_map(|m| get(m).clone())
}

/// Group members by email and pick a keeper for every group with duplicates.
pub fn plan_consolidation(members: &[Member]) -> Vec<DuplicateGroup> {
    let mut by_email: BTreeMap<String, Vec<Member>> = BTreeMap::new();
    for member in members {
        if let Some(email) = member.normalized_email() {
            by_email.entry(email).or_default().push(member.clone());
        }
    }

    by_email
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(email, mut group)| {
            group.sort_by(keeper_order);
            let keeper = group.remove(0);

            let fill = MemberUpdate {
                full_name: fill_from(&keeper.full_name, &group, |m| &m.full_name),
                church_unit: fill_from(&keeper.church_unit, &group, |m| &m.church_unit),
                phone: fill_from(&keeper.phone, &group, |m| &m.phone),
                ..Default::default()
            };

            DuplicateGroup {
                email,
                keeper,
                duplicates: group,
                fill,
            }
        })
        .collect()
}

/// Reconciles profiles and members.
#[derive(Clone)]
pub struct MemberSync {
    db: BaasDb,
    style: ColumnStyle,
    chunk_size: usize,
}

impl MemberSync {
    pub fn new(db: BaasDb, style: ColumnStyle, chunk_size: usize) -> Self {
        Self {
            db,
            style,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn style(&self) -> ColumnStyle {
        self.style
    }

    /// Run a member-table write in the configured column style, then in the
    /// other styles while the table rejects the column names.
    async fn with_style_fallback<T, F, Fut>(&self, mut op: F) -> Result<T, AppError>
    where
        F: FnMut(ColumnStyle) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut last = match op(self.style).await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_missing_column() => e,
            Err(e) => return Err(e),
        };

        for style in self.style.alternatives() {
            match op(style).await {
                Ok(v) => {
                    tracing::warn!(
                        configured = ?self.style,
                        working = ?style,
                        "Member table uses a different column spelling than configured"
                    );
                    return Ok(v);
                }
                Err(e) if e.is_missing_column() => last = e,
                Err(e) => return Err(e),
            }
        }

        Err(last)
    }

    /// Insert one member, retrying across column styles.
    pub async fn insert_member(&self, member: &NewMember) -> Result<Member, AppError> {
        self.with_style_fallback(|style| {
            let row = member.to_row(style);
            let db = self.db.clone();
            async move { db.insert_member(&row).await }
        })
        .await
    }

    /// Patch one member, retrying across column styles.
    pub async fn update_member(&self, id: &str, update: &MemberUpdate) -> Result<Option<Member>, AppError> {
        self.with_style_fallback(|style| {
            let patch = update.to_patch(style);
            let db = self.db.clone();
            let id = id.to_string();
            async move { db.update_member(&id, &patch).await }
        })
        .await
    }

    async fn link_member(&self, member_id: &str, user_id: uuid::Uuid) -> Result<Option<Member>, AppError> {
        self.with_style_fallback(|style| {
            let mut patch = Row::new();
            patch.insert(style.user_id().into(), user_id.to_string().into());
            let db = self.db.clone();
            let id = member_id.to_string();
            async move { db.update_member(&id, &patch).await }
        })
        .await
    }

    /// Member row for a profile. Among duplicates with the same email the
    /// row already linked to `user_id` wins, then an unlinked row.
    async fn find_member(&self, email: &str, user_id: uuid::Uuid) -> Result<Option<Member>, AppError> {
        let candidates = self.db.find_members_by_email(email).await?;
        if let Some(member) = pick_member(candidates, user_id) {
            return Ok(Some(member));
        }
        match self.db.get_member_by_user_id(user_id, self.style).await {
            Ok(found) => Ok(found),
            // Filtering on a column the table does not have
            Err(e) if e.is_missing_column() || matches!(&e, AppError::Baas(b) if b.status == 400) => {
                tracing::debug!(error = %e, "Member lookup by user id unavailable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Copy member fields onto a profile that lacks them. Best-effort.
    async fn backfill_profile(&self, profile: &Profile, member: &Member) {
        let mut patch = Row::new();
        if profile.full_name.is_none() {
            if let Some(v) = &member.full_name {
                patch.insert("full_name".into(), v.clone().into());
            }
        }
        if profile.church_unit.is_none() {
            if let Some(v) = &member.church_unit {
                patch.insert("church_unit".into(), v.clone().into());
            }
        }
        if profile.phone.is_none() {
            if let Some(v) = &member.phone {
                patch.insert("phone".into(), v.clone().into());
            }
        }
        if patch.is_empty() {
            return;
        }

        match self.db.update_profile(profile.id, &patch).await {
            Ok(_) => tracing::info!(profile_id = %profile.id, fields = patch.len(), "Back-filled profile from member"),
            Err(e) => tracing::warn!(profile_id = %profile.id, error = %e, "Failed to back-fill profile"),
        }
    }

    /// Make sure the profile with this email has a member row.
    ///
    /// Never returns an error: failures are reported in the result.
    pub async fn sync_specific_user(&self, email: &str) -> SyncResult {
        let email = normalize_email(email);
        if email.is_empty() {
            return SyncResult::failed("Email is required");
        }

        let profile = match self.db.get_profile_by_email(&email).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return SyncResult::failed(format!("No profile found for {}", email)),
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Profile lookup failed");
                return SyncResult::failed(format!(
                    "Failed to look up profile for {}: {}",
                    email,
                    e.user_message()
                ));
            }
        };

        let existing = match self.find_member(&email, profile.id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Member lookup failed");
                return SyncResult::failed(format!(
                    "Failed to look up member for {}: {}",
                    email,
                    e.user_message()
                ));
            }
        };

        match existing {
            Some(member) => match member.user_id {
                Some(user_id) if user_id == profile.id => {
                    self.backfill_profile(&profile, &member).await;
                    SyncResult::ok(format!("Member already exists for {}", email))
                }
                Some(other) => SyncResult::failed(format!(
                    "Member {} for {} is linked to a different user ({})",
                    member.id, email, other
                )),
                None => match self.link_member(&member.id, profile.id).await {
                    Ok(None) => SyncResult::failed(format!("Member {} no longer exists", member.id)),
                    Ok(Some(_)) => {
                        tracing::info!(email = %email, member_id = %member.id, "Linked member to profile");
                        self.backfill_profile(&profile, &member).await;
                        SyncResult::ok(format!(
                            "Linked existing member {} to profile for {}",
                            member.id, email
                        ))
                    }
                    Err(e) => SyncResult::failed(format!(
                        "Failed to link member {}: {}",
                        member.id,
                        e.user_message()
                    )),
                },
            },
            None => {
                let Some(new_member) = NewMember::from_profile(&profile) else {
                    return SyncResult::failed(format!("Profile for {} has no usable email", email));
                };
                match self.insert_member(&new_member).await {
                    Ok(member) => {
                        tracing::info!(email = %email, member_id = %member.id, "Created member from profile");
                        SyncResult::ok(format!("Created member record for {}", email))
                    }
                    Err(e) => {
                        tracing::warn!(email = %email, error = %e, "Member insert failed");
                        SyncResult::failed(format!(
                            "Failed to create member for {}: {}",
                            email,
                            e.user_message()
                        ))
                    }
                }
            }
        }
    }

    /// Create a member row for every profile that lacks one.
    ///
    /// Inserts go out in sequential chunks. A failed chunk is retried row by
    /// row so one bad profile does not block the rest.
    pub async fn sync_profiles_to_members(&self, dry_run: bool) -> SyncReport {
        let profiles = match self.db.list_profiles().await {
            Ok(p) => p,
            Err(e) => return SyncReport::aborted(format!("Failed to load profiles: {}", e.user_message()), dry_run),
        };
        let members = match self.db.list_members().await {
            Ok(m) => m,
            Err(e) => return SyncReport::aborted(format!("Failed to load members: {}", e.user_message()), dry_run),
        };

        let plan = plan_sync(&profiles, &members);
        let mut report = SyncReport {
            dry_run,
            total_profiles: profiles.len(),
            already_synced: plan.already_synced,
            skipped: plan.skipped,
            ..Default::default()
        };

        tracing::info!(
            profiles = profiles.len(),
            members = members.len(),
            missing = plan.to_create.len(),
            dry_run,
            "Profile to member sync planned"
        );

        if dry_run {
            report.success = true;
            report.message = format!("Dry run: {} member(s) would be created", plan.to_create.len());
            return report;
        }

        for (index, chunk) in plan.to_create.chunks(self.chunk_size).enumerate() {
            let rows: Vec<Row> = chunk.iter().map(|m| m.to_row(self.style)).collect();

            match self.db.insert_members(&rows).await {
                Ok(inserted) => {
                    report.created += inserted.len();
                    tracing::info!(chunk = index, rows = inserted.len(), "Inserted member chunk");
                }
                Err(e) => {
                    tracing::warn!(chunk = index, error = %e, "Chunk insert failed, retrying rows individually");
                    for member in chunk {
                        match self.insert_member(member).await {
                            Ok(_) => report.created += 1,
                            Err(e) => {
                                report.failed += 1;
                                report.errors.push(format!("{}: {}", member.email, e.user_message()));
                            }
                        }
                    }
                }
            }
        }

        report.success = report.failed == 0;
        report.message = format!(
            "Created {} member(s), {} already synced, {} skipped, {} failed",
            report.created, report.already_synced, report.skipped, report.failed
        );
        report
    }

    /// Fold duplicate member rows (same email) into one.
    pub async fn consolidate_members(&self, dry_run: bool) -> ConsolidationReport {
        let members = match self.db.list_members().await {
            Ok(m) => m,
            Err(e) => {
                return ConsolidationReport {
                    message: format!("Failed to load members: {}", e.user_message()),
                    dry_run,
                    ..Default::default()
                }
            }
        };

        let groups = plan_consolidation(&members);
        let mut report = ConsolidationReport {
            dry_run,
            duplicate_groups: groups.len(),
            ..Default::default()
        };

        if dry_run {
            report.success = true;
            report.message = format!(
                "Dry run: {} duplicate group(s), {} row(s) would be removed",
                groups.len(),
                groups.iter().map(|g| g.duplicates.len()).sum::<usize>()
            );
            return report;
        }

        for group in &groups {
            if !group.fill.is_empty() {
                match self.update_member(&group.keeper.id, &group.fill).await {
                    Ok(Some(_)) => report.merged += 1,
                    Ok(None) => {
                        report.failed += 1;
                        report.errors.push(format!(
                            "{}: keeper {} not found, duplicates left in place",
                            group.email, group.keeper.id
                        ));
                        continue;
                    }
                    Err(e) => {
                        report.failed += 1;
                        report.errors.push(format!("{}: merge failed: {}", group.email, e.user_message()));
                        continue;
                    }
                }
            }

            for duplicate in &group.duplicates {
                match self.db.delete_member(&duplicate.id).await {
                    Ok(true) => report.deleted += 1,
                    Ok(false) => tracing::debug!(member_id = %duplicate.id, "Duplicate already gone"),
                    Err(e) => {
                        report.failed += 1;
                        report.errors.push(format!(
                            "{}: delete of {} failed: {}",
                            group.email,
                            duplicate.id,
                            e.user_message()
                        ));
                    }
                }
            }
        }

        report.success = report.failed == 0;
        report.message = format!(
            "{} duplicate group(s): {} merged, {} removed, {} failed",
            report.duplicate_groups, report.merged, report.deleted, report.failed
        );
        tracing::info!(
            groups = report.duplicate_groups,
            deleted = report.deleted,
            failed = report.failed,
            "Member consolidation finished"
        );
        report
    }

    /// Push a profile's current name, unit and phone onto its member row,
    /// creating the member first if needed.
    pub async fn mirror_profile(&self, profile: &Profile) -> SyncResult {
        let Some(email) = profile.normalized_email() else {
            return SyncResult::failed("Profile has no email");
        };

        let ensured = self.sync_specific_user(&email).await;
        if !ensured.success {
            return ensured;
        }

        let member = match self.find_member(&email, profile.id).await {
            Ok(Some(member)) => member,
            Ok(None) => return SyncResult::failed(format!("No member found for {}", email)),
            Err(e) => return SyncResult::failed(e.user_message()),
        };

        let update = MemberUpdate {
            full_name: profile.full_name.clone().filter(|v| member.full_name.as_ref() != Some(v)),
            church_unit: profile
                .church_unit
                .clone()
                .filter(|v| member.church_unit.as_ref() != Some(v)),
            phone: profile.phone.clone().filter(|v| member.phone.as_ref() != Some(v)),
            ..Default::default()
        };
        if update.is_empty() {
            return SyncResult::ok(format!("Member for {} is up to date", email));
        }

        match self.update_member(&member.id, &update).await {
            Ok(_) => SyncResult::ok(format!("Updated member record for {}", email)),
            Err(e) => SyncResult::failed(format!(
                "Failed to update member for {}: {}",
                email,
                e.user_message()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(id: &str, email: Option<&str>) -> Profile {
        serde_json::from_value(json!({ "id": id, "email": email, "full_name": "P" })).unwrap()
    }

    fn member(id: &str, email: &str, user_id: Option<&str>, created_at: Option<&str>) -> Member {
        serde_json::from_value(json!({
            "id": id,
            "email": email,
            "user_id": user_id,
            "created_at": created_at,
        }))
        .unwrap()
    }

    const U1: &str = "11111111-1111-4111-8111-111111111111";
    const U2: &str = "22222222-2222-4222-8222-222222222222";
    const U3: &str = "33333333-3333-4333-8333-333333333333";
    const U4: &str = "44444444-4444-4444-8444-444444444444";

    #[test]
    fn test_plan_sync_classifies_profiles() {
        let profiles = vec![
            profile(U1, Some("Has@Member.org")),
            profile(U2, None),
            profile(U3, Some("new@church.org")),
            profile(U4, Some("NEW@church.org")),
        ];
        let members = vec![member("1", "has@member.org", None, None)];

        let plan = plan_sync(&profiles, &members);
        assert_eq!(plan.already_synced, 1);
        assert_eq!(plan.skipped, 2);
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].email, "new@church.org");
    }

    #[test]
    fn test_plan_sync_matches_on_user_id() {
        let profiles = vec![profile(U1, Some("changed@church.org"))];
        let members = vec![member("9", "old@church.org", Some(U1), None)];
        let plan = plan_sync(&profiles, &members);
        assert_eq!(plan.already_synced, 1);
        assert!(plan.to_create.is_empty());
    }

    #[test]
    fn test_consolidation_prefers_linked_then_oldest() {
        let mut a = member("3", "dup@church.org", None, Some("2023-01-01T00:00:00Z"));
        a.phone = Some("555".into());
        let mut b = member("7", "DUP@church.org", Some(U1), Some("2024-01-01T00:00:00Z"));
        b.full_name = Some("Dorcas".into());
        let c = member("5", "dup@church.org", None, None);
        let single = member("8", "only@church.org", None, None);

        let groups = plan_consolidation(&[a, b, c, single]);
        assert_eq!(groups.len(), 1);

        let group = &groups[0];
        assert_eq!(group.email, "dup@church.org");
        assert_eq!(group.keeper.id, "7");
        let ids: Vec<_> = group.duplicates.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "5"]);
        assert_eq!(group.fill.phone.as_deref(), Some("555"));
        assert_eq!(group.fill.full_name, None);
    }

    #[test]
    fn test_consolidation_falls_back_to_numeric_id() {
        let groups = plan_consolidation(&[
            member("10", "x@church.org", None, None),
            member("9", "x@church.org", None, None),
        ]);
        assert_eq!(groups[0].keeper.id, "9");
    }

    #[test]
    fn test_pick_member_prefers_own_link_then_unlinked() {
        let own = uuid::Uuid::parse_str(U1).unwrap();
        let picked = pick_member(
            vec![
                member("2", "a@church.org", Some(U2), None),
                member("3", "a@church.org", None, None),
                member("5", "a@church.org", Some(U1), None),
            ],
            own,
        );
        assert_eq!(picked.unwrap().id, "5");

        let picked = pick_member(
            vec![
                member("2", "a@church.org", Some(U2), None),
                member("3", "a@church.org", None, None),
            ],
            own,
        );
        assert_eq!(picked.unwrap().id, "3");
        assert!(pick_member(vec![], own).is_none());
    }

    #[test]
    fn test_sync_result_serializes_flat() {
        let value = serde_json::to_value(SyncResult::failed("nope")).unwrap();
        assert_eq!(value, json!({ "success": false, "message": "nope" }));
    }
}
