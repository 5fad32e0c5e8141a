// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Query-string builder for the table API (PostgREST filter syntax).

use std::fmt::Display;

/// Filters, ordering and paging for a table request.
///
/// Values are URL-encoded by the HTTP client; this type only produces the
/// PostgREST operator syntax (`eq.x`, `in.("a","b")`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_string(), value));
        self
    }

    fn set(mut self, key: &str, value: String) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_string(), value));
        self
    }

    pub fn select(self, columns: &str) -> Self {
        self.set("select", columns.to_string())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("eq.{}", value))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("neq.{}", value))
    }

    /// Case-insensitive equality: `ilike` with LIKE wildcards escaped.
    pub fn eq_ignore_case(self, column: &str, value: &str) -> Self {
        self.push(column, format!("ilike.{}", escape_like(value)))
    }

    /// Case-insensitive substring match.
    pub fn contains(self, column: &str, value: &str) -> Self {
        self.push(column, format!("ilike.*{}*", escape_like(value)))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.push(column, "is.null".to_string())
    }

    pub fn in_list<S: AsRef<str>>(self, column: &str, values: &[S]) -> Self {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("\"{}\"", v.as_ref().replace('\\', "\\\\").replace('"', "\\\"")))
            .collect();
        self.push(column, format!("in.({})", quoted.join(",")))
    }

    /// Raw `or=(...)` group, e.g. `full_name.ilike.*ann*,email.ilike.*ann*`.
    pub fn or(self, conditions: &str) -> Self {
        self.push("or", format!("({})", conditions))
    }

    pub fn order(self, column: &str, ascending: bool) -> Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.set("order", format!("{}.{}.nullslast", column, dir))
    }

    pub fn limit(self, limit: usize) -> Self {
        self.set("limit", limit.to_string())
    }

    pub fn offset(self, offset: usize) -> Self {
        self.set("offset", offset.to_string())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of a parameter, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Escape LIKE metacharacters so a value matches literally.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Strip characters that would break out of an `or=(...)` group, then
/// escape LIKE metacharacters so the term matches literally.
pub fn sanitize_search(term: &str) -> String {
    let kept: String = term
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"' | ':'))
        .collect();
    escape_like(kept.trim())
}
