//! Durable identity store interface and an in-process implementation.
//!
//! The Postgres implementation lives in [`crate::db`].

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::model::{Identity, UserId};
use crate::error::{GateError, Result};

/// Source of truth for user identities.
///
/// `get_by_id` fails with `NotFound` when the user is absent (or inactive),
/// and with `Unavailable`/`Timeout` on transport problems.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_by_id(&self, id: UserId) -> Result<Identity>;
}

/// Identity store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    identities: DashMap<UserId, Identity>,
    fetches: AtomicU64,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        let store = Self::new();
        for identity in identities {
            store.insert(identity);
        }
        store
    }

    /// Insert or replace an identity.
    pub fn insert(&self, identity: Identity) {
        self.identities.insert(identity.id, identity);
    }

    pub fn remove(&self, id: &UserId) -> Option<Identity> {
        self.identities.remove(id).map(|(_, identity)| identity)
    }

    /// Mark a user inactive. Returns false if the user does not exist.
    pub fn deactivate(&self, id: &UserId) -> bool {
        match self.identities.get_mut(id) {
            Some(mut identity) => {
                identity.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Number of `get_by_id` calls served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn get_by_id(&self, id: UserId) -> Result<Identity> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.identities
            .get(&id)
            .filter(|identity| identity.is_active)
            .map(|identity| identity.value().clone())
            .ok_or_else(|| GateError::not_found("user", id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::model::Role;

    fn alice() -> Identity {
        Identity::new(UserId::new(), "alice", "alice@example.com", Role::new(1, "user", 1))
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let identity = alice();
        let store = InMemoryIdentityStore::with_identities([identity.clone()]);

        assert_eq!(store.get_by_id(identity.id).await.unwrap(), identity);
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let store = InMemoryIdentityStore::new();
        let err = store.get_by_id(UserId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_inactive_user_is_not_found() {
        let identity = alice();
        let store = InMemoryIdentityStore::with_identities([identity.clone()]);
        assert!(store.deactivate(&identity.id));

        assert!(store.get_by_id(identity.id).await.unwrap_err().is_not_found());
    }
}
