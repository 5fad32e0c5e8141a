// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod columns;
pub mod content;
pub mod member;
pub mod profile;
pub mod role;

pub use columns::{ColumnStyle, Row};
pub use content::{Announcement, Event, NewAnnouncement, NewEvent, NewSermon, Sermon};
pub use member::{Member, MemberUpdate, NewMember};
pub use profile::{normalize_email, Profile, ProfileUpdate};
pub use role::{AppRole, Permission, Permissions, UserRole};
