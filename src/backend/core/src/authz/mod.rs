//! Role-hierarchy authorization.
//!
//! - **Roles**: the seeded `user` < `moderator` < `admin` hierarchy and the
//!   [`RoleDirectory`] lookup
//! - **Gate**: rank comparison plus the resource-owner bypass
//!
//! # Usage
//!
//! ```rust,ignore
//! use feedgate_core::authz::{AuthorizationGate, InMemoryRoleDirectory};
//!
//! let gate = AuthorizationGate::new(Arc::new(InMemoryRoleDirectory::new()));
//! gate.authorize_owned(&caller, &post_author, "moderator").await?;
//! ```

pub mod gate;
pub mod roles;

pub use gate::{AuthorizationGate, AuthzOutcome};
pub use roles::{InMemoryRoleDirectory, PredefinedRole, RoleDirectory};
