//! Database layer (BaaS table API).

pub mod baas;
pub mod query;

pub use baas::BaasDb;
pub use query::Query;

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const MEMBERS: &str = "members";
    pub const USER_ROLES: &str = "user_roles";
    pub const EVENTS: &str = "events";
    pub const SERMONS: &str = "sermons";
    pub const ANNOUNCEMENTS: &str = "announcements";

    /// Tables whose row counts appear on the admin dashboard.
    pub const DASHBOARD: [&str; 6] = [PROFILES, MEMBERS, USER_ROLES, EVENTS, SERMONS, ANNOUNCEMENTS];
}
