//! Role hierarchy and role lookup.
//!
//! feedgate seeds three roles:
//!
//! | Role       | Rank | Description                                   |
//! |------------|------|-----------------------------------------------|
//! | user       | 1    | Regular account                               |
//! | moderator  | 2    | May act on other users' resources             |
//! | admin      | 3    | Full access                                   |
//!
//! A higher rank includes the privileges of every lower rank.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{GateError, Result};
use crate::identity::Role;

/// Seeded role templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedRole {
    User,
    Moderator,
    Admin,
}

impl PredefinedRole {
    /// Role name as stored in the directory.
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }

    pub fn rank(&self) -> i32 {
        match self {
            Self::User => 1,
            Self::Moderator => 2,
            Self::Admin => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::User => "Regular account",
            Self::Moderator => "May act on other users' resources",
            Self::Admin => "Full access",
        }
    }

    /// Build a full [`Role`] from this template. Ids follow rank order.
    pub fn to_role(&self) -> Role {
        Role::new(i64::from(self.rank()), self.name(), self.rank())
            .with_description(self.description())
    }

    pub fn all() -> [PredefinedRole; 3] {
        [Self::User, Self::Moderator, Self::Admin]
    }

    pub fn all_defaults() -> Vec<Role> {
        Self::all().iter().map(|r| r.to_role()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Role Directory
// ═══════════════════════════════════════════════════════════════════════════════

/// Lookup of roles by name.
///
/// `get_by_name` fails with `NotFound` for an unknown name, and with
/// `Unavailable`/`Timeout` on transport problems.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Role>;
}

/// Role directory held in memory, seeded with the predefined roles.
#[derive(Debug)]
pub struct InMemoryRoleDirectory {
    roles: DashMap<String, Role>,
    lookups: AtomicU64,
}

impl InMemoryRoleDirectory {
    /// Create a directory with the predefined roles.
    pub fn new() -> Self {
        Self::with_roles(PredefinedRole::all_defaults())
    }

    pub fn empty() -> Self {
        Self::with_roles(std::iter::empty())
    }

    pub fn with_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let directory = Self {
            roles: DashMap::new(),
            lookups: AtomicU64::new(0),
        };
        for role in roles {
            directory.insert(role);
        }
        directory
    }

    pub fn insert(&self, role: Role) {
        self.roles.insert(role.name.clone(), role);
    }

    /// Number of `get_by_name` calls served so far.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRoleDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoleDirectory {
    async fn get_by_name(&self, name: &str) -> Result<Role> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.roles
            .get(name)
            .map(|role| role.value().clone())
            .ok_or_else(|| GateError::not_found("role", name))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
