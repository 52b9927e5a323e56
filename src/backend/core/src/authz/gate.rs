//! Authorization decisions over the role hierarchy.
//!
//! The gate answers one question: "does this identity hold at least the
//! required role?". Ownership is layered on top by [`AuthorizationGate::authorize_owned`].

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::roles::RoleDirectory;
use crate::error::{GateError, Result};
use crate::identity::{Identity, UserId};

/// Outcome of an ownership-aware check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthzOutcome {
    /// The identity owns the resource.
    Owner,
    /// The identity's rank satisfies the requirement.
    Rank,
    Denied,
}

impl AuthzOutcome {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied)
    }

    fn as_label(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Rank => "rank",
            Self::Denied => "denied",
        }
    }
}

/// Role-rank authorization backed by a [`RoleDirectory`].
#[derive(Clone)]
pub struct AuthorizationGate {
    roles: Arc<dyn RoleDirectory>,
}

impl AuthorizationGate {
    pub fn new(roles: Arc<dyn RoleDirectory>) -> Self {
        Self { roles }
    }

    /// Whether `identity` holds at least `required_role`.
    ///
    /// An unknown role name is a denial, not an error. Transport failures of
    /// the directory propagate, so callers never fail open.
    pub async fn is_authorized(&self, identity: &Identity, required_role: &str) -> Result<bool> {
        let required = match self.roles.get_by_name(required_role).await {
            Ok(role) => role,
            Err(e) if e.is_not_found() => {
                warn!(role = required_role, "authorization against unknown role");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let allowed = identity.role.satisfies(&required);
        debug!(
            user_id = %identity.id,
            role = %identity.role.name,
            required = %required.name,
            allowed,
            "role check"
        );
        Ok(allowed)
    }

    /// Decide access to a resource owned by `owner`.
    ///
    /// The owner is always allowed; anyone else needs `required_role`.
    pub async fn check_owned(
        &self,
        identity: &Identity,
        owner: &UserId,
        required_role: &str,
    ) -> Result<AuthzOutcome> {
        let outcome = if identity.owns(owner) {
            AuthzOutcome::Owner
        } else if self.is_authorized(identity, required_role).await? {
            AuthzOutcome::Rank
        } else {
            AuthzOutcome::Denied
        };

        counter!("feedgate_authz_decisions_total", "outcome" => outcome.as_label()).increment(1);
        Ok(outcome)
    }

    /// Like [`check_owned`](Self::check_owned), but a denial is a `Forbidden` error.
    pub async fn authorize_owned(
        &self,
        identity: &Identity,
        owner: &UserId,
        required_role: &str,
    ) -> Result<()> {
        if self.check_owned(identity, owner, required_role).await?.is_allowed() {
            Ok(())
        } else {
            Err(GateError::forbidden())
        }
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate").finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
