// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile model: the auth-linked user record.

use crate::models::columns::{self, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Profile row from the `profiles` table. The id is the auth user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Row")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub church_unit: Option<String>,
    pub phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<Row> for Profile {
    type Error = String;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let raw_id = columns::text(&row, &["id"]).ok_or("profile row has no id")?;
        let id = Uuid::parse_str(&raw_id).map_err(|e| format!("profile id '{}': {}", raw_id, e))?;

        Ok(Self {
            id,
            email: columns::text(&row, &["email"]),
            full_name: columns::text(&row, columns::FULL_NAME),
            church_unit: columns::text(&row, columns::CHURCH_UNIT),
            phone: columns::text(&row, columns::PHONE),
            created_at: columns::timestamp(&row, columns::CREATED_AT),
            updated_at: columns::timestamp(&row, columns::UPDATED_AT),
        })
    }
}

impl Profile {
    /// Lower-cased email, if any.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(normalize_email).filter(|e| !e.is_empty())
    }
}

/// Trim and lower-case an email for comparisons.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Self-service profile edit.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(length(max = 100))]
    pub church_unit: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Patch body for the `profiles` table (snake_case, the table's own spelling).
    pub fn to_patch(&self) -> Row {
        let mut patch = Row::new();
        if let Some(v) = &self.full_name {
            patch.insert("full_name".into(), v.trim().into());
        }
        if let Some(v) = &self.church_unit {
            patch.insert("church_unit".into(), v.trim().into());
        }
        if let Some(v) = &self.phone {
            patch.insert("phone".into(), v.trim().into());
        }
        if !patch.is_empty() {
            patch.insert("updated_at".into(), Utc::now().to_rfc3339().into());
        }
        patch
    }
}
