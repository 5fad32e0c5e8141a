// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Member model: the congregant record that mirrors a profile.

use crate::models::columns::{self, ColumnStyle, Row};
use crate::models::profile::{normalize_email, Profile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Member row from the `members` table.
///
/// Ids are kept as text: older tables use integer keys, newer ones uuids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Row")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Member {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub church_unit: Option<String>,
    pub phone: Option<String>,
    pub user_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<Row> for Member {
    type Error = String;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let id = columns::text(&row, &["id"]).ok_or("member row has no id")?;
        let user_id = columns::text(&row, columns::USER_ID)
            .map(|raw| Uuid::parse_str(&raw).map_err(|e| format!("member user id '{}': {}", raw, e)))
            .transpose()?;

        Ok(Self {
            id,
            email: columns::text(&row, &["email"]),
            full_name: columns::text(&row, columns::FULL_NAME),
            church_unit: columns::text(&row, columns::CHURCH_UNIT),
            phone: columns::text(&row, columns::PHONE),
            user_id,
            is_active: columns::flag(&row, columns::IS_ACTIVE).unwrap_or(true),
            created_at: columns::timestamp(&row, columns::CREATED_AT),
        })
    }
}

impl Member {
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(normalize_email).filter(|e| !e.is_empty())
    }
}

/// A member row to be inserted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct NewMember {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 100))]
    pub church_unit: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl NewMember {
    /// Copy the mirrored fields from a profile. `None` when the profile has no email.
    pub fn from_profile(profile: &Profile) -> Option<Self> {
        let email = profile.normalized_email()?;
        Some(Self {
            full_name: profile
                .full_name
                .clone()
                .or_else(|| Some(email.split('@').next().unwrap_or_default().to_string())),
            email,
            church_unit: profile.church_unit.clone(),
            phone: profile.phone.clone(),
            user_id: Some(profile.id),
        })
    }

    /// Insert body spelled in the given column style.
    pub fn to_row(&self, style: ColumnStyle) -> Row {
        let mut row = Row::new();
        row.insert("email".into(), self.email.clone().into());
        if let Some(v) = &self.full_name {
            row.insert(style.full_name().into(), v.clone().into());
        }
        if let Some(v) = &self.church_unit {
            row.insert(style.church_unit().into(), v.clone().into());
        }
        if let Some(v) = &self.phone {
            row.insert("phone".into(), v.clone().into());
        }
        if let Some(v) = self.user_id {
            row.insert(style.user_id().into(), v.to_string().into());
        }
        row
    }
}

/// Partial member edit by an administrator.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MemberUpdate {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 100))]
    pub church_unit: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl MemberUpdate {
    pub fn to_patch(&self, style: ColumnStyle) -> Row {
        let mut patch = Row::new();
        if let Some(v) = &self.email {
            patch.insert("email".into(), normalize_email(v).into());
        }
        if let Some(v) = &self.full_name {
            patch.insert(style.full_name().into(), v.trim().into());
        }
        if let Some(v) = &self.church_unit {
            patch.insert(style.church_unit().into(), v.trim().into());
        }
        if let Some(v) = &self.phone {
            patch.insert("phone".into(), v.trim().into());
        }
        if let Some(v) = self.is_active {
            let key = match style {
                ColumnStyle::Snake => "is_active",
                ColumnStyle::Lowercase => "isactive",
                ColumnStyle::Camel => "isActive",
            };
            patch.insert(key.into(), v.into());
        }
        patch
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.full_name.is_none()
            && self.church_unit.is_none()
            && self.phone.is_none()
            && self.is_active.is_none()
    }
}
