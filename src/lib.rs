// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Church Hub: member directory and administration backend
//!
//! This crate provides the API server and operator tooling for a church
//! management app whose data lives in a hosted backend (auth, Postgres and
//! row-level security). Its core job is keeping member records in step
//! with user profiles and deciding what each user may do.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::BaasDb;
use error::AppError;
use services::{AuthClient, MemberSync, RoleService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Service-role table client
    pub db: BaasDb,
    pub auth: AuthClient,
    pub roles: RoleService,
    pub sync: MemberSync,
}

impl AppState {
    /// Wire every client from configuration, sharing one HTTP client.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let http = db::baas::http_client()?;
        let db = BaasDb::service_role(
            http.clone(),
            &config.supabase_url,
            &config.anon_key,
            &config.service_role_key,
        );
        let auth = AuthClient::new(
            http,
            &config.supabase_url,
            &config.anon_key,
            &config.service_role_key,
        );
        Ok(Self::with_clients(config, db, auth))
    }

    pub fn with_clients(config: Config, db: BaasDb, auth: AuthClient) -> Self {
        let roles = RoleService::new(db.clone(), config.super_admin_emails.clone());
        let sync = MemberSync::new(db.clone(), config.member_column_style, config.sync_chunk_size);
        Self {
            config,
            db,
            auth,
            roles,
            sync,
        }
    }
}
