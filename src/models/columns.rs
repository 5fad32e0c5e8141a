// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tolerant access to rows whose columns are spelled inconsistently.
//!
//! The `profiles` and `members` tables have been created over time with
//! `full_name`, `fullName` and `fullname` spellings (and so on for the other
//! columns). Rows are read as raw JSON maps and the first non-empty spelling
//! wins; writes use a single configured [`ColumnStyle`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// A raw row as returned by the table API.
pub type Row = Map<String, Value>;

pub const FULL_NAME: &[&str] = &["full_name", "fullName", "fullname", "name"];
pub const CHURCH_UNIT: &[&str] = &["church_unit", "churchUnit", "churchunit"];
pub const PHONE: &[&str] = &["phone", "phone_number", "phoneNumber", "phonenumber"];
pub const USER_ID: &[&str] = &["user_id", "userId", "userid"];
pub const CREATED_AT: &[&str] = &["created_at", "createdAt", "createdat"];
pub const UPDATED_AT: &[&str] = &["updated_at", "updatedAt", "updatedat"];
pub const IS_ACTIVE: &[&str] = &["is_active", "isActive", "isactive"];

/// First non-empty string among `keys`. Numbers are rendered as text.
pub fn text(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match row.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// First boolean among `keys`.
pub fn flag(row: &Row, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| row.get(*k).and_then(Value::as_bool))
}

/// First RFC 3339 timestamp among `keys`.
pub fn timestamp(row: &Row, keys: &[&str]) -> Option<chrono::DateTime<chrono::Utc>> {
    text(row, keys).and_then(|raw| {
        chrono::DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .ok()
    })
}

/// Spelling convention used when writing member rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnStyle {
    /// `full_name`, `church_unit`, `user_id`
    #[default]
    Snake,
    /// `fullname`, `churchunit`, `userid`
    Lowercase,
    /// `fullName`, `churchUnit`, `userId`
    Camel,
}

impl ColumnStyle {
    pub const ALL: [ColumnStyle; 3] = [ColumnStyle::Snake, ColumnStyle::Lowercase, ColumnStyle::Camel];

    pub fn full_name(self) -> &'static str {
        match self {
            ColumnStyle::Snake => "full_name",
            ColumnStyle::Lowercase => "fullname",
            ColumnStyle::Camel => "fullName",
        }
    }

    pub fn church_unit(self) -> &'static str {
        match self {
            ColumnStyle::Snake => "church_unit",
            ColumnStyle::Lowercase => "churchunit",
            ColumnStyle::Camel => "churchUnit",
        }
    }

    pub fn user_id(self) -> &'static str {
        match self {
            ColumnStyle::Snake => "user_id",
            ColumnStyle::Lowercase => "userid",
            ColumnStyle::Camel => "userId",
        }
    }

    /// The other styles, in fallback order.
    pub fn alternatives(self) -> impl Iterator<Item = ColumnStyle> {
        Self::ALL.into_iter().filter(move |s| *s != self)
    }
}

impl FromStr for ColumnStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snake" | "snake_case" => Ok(ColumnStyle::Snake),
            "lowercase" | "lower" => Ok(ColumnStyle::Lowercase),
            "camel" | "camelcase" => Ok(ColumnStyle::Camel),
            other => Err(format!("unknown column style '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_text_prefers_first_non_empty_spelling() {
        let r = row(json!({ "full_name": "  ", "fullName": "Grace Hopper", "fullname": "x" }));
        assert_eq!(text(&r, FULL_NAME).as_deref(), Some("Grace Hopper"));
    }

    #[test]
    fn test_text_renders_numbers() {
        let r = row(json!({ "id": 42 }));
        assert_eq!(text(&r, &["id"]).as_deref(), Some("42"));
    }

    #[test]
    fn test_column_style_parse_and_alternatives() {
        assert_eq!("camelCase".parse::<ColumnStyle>().unwrap(), ColumnStyle::Camel);
        assert!("kebab".parse::<ColumnStyle>().is_err());

        let alts: Vec<_> = ColumnStyle::Lowercase.alternatives().collect();
        assert_eq!(alts, vec![ColumnStyle::Snake, ColumnStyle::Camel]);
    }
}
