// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod diagnostics;
pub mod management;
pub mod roles;
pub mod sync;

pub use auth::{AuthAccount, AuthClient, Session};
pub use diagnostics::{diagnose_user, UserDiagnosis};
pub use management::ManagementClient;
pub use roles::RoleService;
pub use sync::{ConsolidationReport, MemberSync, SyncReport, SyncResult};
