// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Operator tooling for Church Hub.
//!
//! Each subcommand loads configuration from the environment (and `.env`),
//! performs one maintenance action against the hosted backend with the
//! service-role key, prints the outcome and exits 0 on success, 1 on failure.

use anyhow::{Context, Result};
use church_hub::{
    config::Config,
    models::AppRole,
    services::{diagnose_user, ConsolidationReport, ManagementClient, SyncReport, SyncResult},
    AppState,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Maintenance commands for the member directory and roles.
#[derive(Parser)]
#[command(name = "church-admin")]
#[command(about = "Maintenance commands for Church Hub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create member rows for every profile that lacks one.
    #[command(name = "sync-all")]
    SyncAll {
        /// Report what would be created without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile a single user's member row.
    #[command(name = "sync-user")]
    SyncUser { email: String },

    /// Merge member rows that share an email.
    Consolidate {
        /// Report duplicate groups without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show how a user's auth, profile, member and role records line up.
    Diagnose { email: String },

    /// Make a user a super admin.
    #[command(name = "grant-super-admin")]
    GrantSuperAdmin { email: String },

    /// Give a user a role (super_admin, admin, pastor, worker, member).
    #[command(name = "grant-role")]
    GrantRole { email: String, role: AppRole },

    /// Take a role away from a user.
    #[command(name = "revoke-role")]
    RevokeRole { email: String, role: AppRole },

    /// List auth users with their roles.
    #[command(name = "list-users")]
    ListUsers,

    /// Create a confirmed auth user and reconcile their member row.
    #[command(name = "create-user")]
    CreateUser {
        email: String,
        /// Initial password
        #[arg(long, env = "CHURCH_ADMIN_PASSWORD")]
        password: String,
        /// Display name stored in the user's metadata
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete an auth user. Their member row is kept.
    #[command(name = "delete-user")]
    DeleteUser { email: String },

    /// Run a SQL file through the management API.
    ///
    /// Needs SUPABASE_ACCESS_TOKEN.
    #[command(name = "apply-sql")]
    ApplySql { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            println!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run one command. `Ok(false)` means it ran but reported failure.
async fn run(command: Commands) -> Result<bool> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let state = AppState::from_config(config.clone())?;

    let ok = match command {
        Commands::SyncAll { dry_run } => {
            println!("ℹ️  Syncing profiles to members{}", dry_run_note(dry_run));
            print_sync_report(&state.sync.sync_profiles_to_members(dry_run).await)
        }
        Commands::SyncUser { email } => {
            println!("ℹ️  Syncing {}", email);
            print_result(&state.sync.sync_specific_user(&email).await)
        }
        Commands::Consolidate { dry_run } => {
            println!("ℹ️  Consolidating duplicate members{}", dry_run_note(dry_run));
            print_consolidation(&state.sync.consolidate_members(dry_run).await)
        }
        Commands::Diagnose { email } => {
            let report = diagnose_user(&state.db, &state.auth, state.sync.style(), &email).await?;
            println!("ℹ️  Diagnosis for {}", report.email);
            print_presence("Auth user", report.auth_user.as_ref().map(|u| u.id.to_string()));
            print_presence("Profile", report.profile.as_ref().map(|p| p.id.to_string()));
            print_presence("Member", report.member.as_ref().map(|m| m.id.clone()));
            if report.roles.is_empty() {
                println!("⚠️  Roles: none");
            } else {
                println!("✅ Roles: {}", report.roles.join(", "));
            }
            for issue in &report.issues {
                println!("❌ {}", issue);
            }
            if report.healthy {
                println!("✅ No problems found");
            }
            report.healthy
        }
        Commands::GrantSuperAdmin { email } => {
            print_result(&state.roles.grant_super_admin(&state.auth, &email).await)
        }
        Commands::GrantRole { email, role } => {
            print_result(&state.roles.grant_role_by_email(&state.auth, &email, role).await)
        }
        Commands::RevokeRole { email, role } => {
            print_result(&state.roles.revoke_role_by_email(&state.auth, &email, role).await)
        }
        Commands::ListUsers => {
            let users = state.auth.list_all_users().await?;
            println!("ℹ️  {} user(s)", users.len());
            for user in users {
                let roles = state.roles.roles_for(user.id).await.unwrap_or_else(|e| {
                    tracing::warn!(user_id = %user.id, error = %e, "Failed to load roles");
                    Vec::new()
                });
                let roles: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
                println!(
                    "   {}  {}  [{}]  last sign-in: {}",
                    user.id,
                    user.email.as_deref().unwrap_or("(no email)"),
                    roles.join(", "),
                    user.last_sign_in_at.as_deref().unwrap_or("never"),
                );
            }
            true
        }
        Commands::CreateUser {
            email,
            password,
            name,
        } => {
            let user = state
                .auth
                .create_user(&email, &password, name.as_deref())
                .await?;
            println!("✅ Created auth user {} ({})", email, user.id);
            // The profile row comes from a database trigger
            print_result(&state.sync.sync_specific_user(&email).await)
        }
        Commands::DeleteUser { email } => match state.auth.find_user_by_email(&email).await? {
            Some(user) => {
                state.auth.delete_user(user.id).await?;
                println!("✅ Deleted auth user {} ({})", email, user.id);
                true
            }
            None => {
                println!("❌ No auth user found for {}", email);
                false
            }
        },
        Commands::ApplySql { file } => {
            let sql = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let http = church_hub::db::baas::http_client()?;
            let management = ManagementClient::from_config(http, &config)?;
            println!("ℹ️  Applying {}", file.display());
            let output = management.run_sql(&sql).await?;
            if !output.is_null() {
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            println!("✅ SQL applied");
            true
        }
    };

    Ok(ok)
}

fn dry_run_note(dry_run: bool) -> &'static str {
    if dry_run {
        " (dry run)"
    } else {
        ""
    }
}

fn print_result(result: &SyncResult) -> bool {
    let icon = if result.success { "✅" } else { "❌" };
    println!("{} {}", icon, result.message);
    result.success
}

fn print_presence(label: &str, id: Option<String>) {
    match id {
        Some(id) => println!("✅ {}: {}", label, id),
        None => println!("⚠️  {}: missing", label),
    }
}

fn print_sync_report(report: &SyncReport) -> bool {
    println!(
        "ℹ️  {} profile(s): {} already synced, {} created, {} skipped, {} failed",
        report.total_profiles, report.already_synced, report.created, report.skipped, report.failed
    );
    for error in &report.errors {
        println!("❌ {}", error);
    }
    let icon = if report.success { "✅" } else { "❌" };
    println!("{} {}", icon, report.message);
    report.success
}

fn print_consolidation(report: &ConsolidationReport) -> bool {
    for error in &report.errors {
        println!("❌ {}", error);
    }
    let icon = if report.success { "✅" } else { "❌" };
    println!("{} {}", icon, report.message);
    report.success
}

/// Human-readable logging to stderr; `RUST_LOG` raises the level.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
