//! In-process stores backed by `DashMap`.
//!
//! Suitable for single-instance deployments and tests. Expiry is lazy:
//! expired entries are dropped when touched, so no background task is needed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CredentialStore, IdentityStore, StorageError, StorageResult};
use crate::types::Identity;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone)]
struct SetEntry {
    members: HashSet<String>,
    expires_at: Instant,
}

impl SetEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Credential store held in process memory.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    entries: Arc<DashMap<String, Entry>>,
    sets: Arc<DashMap<String, SetEntry>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) plain keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let value = self
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone());

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }
        Ok(value)
    }

    async fn take(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        // DashMap::remove holds the shard lock, so only one caller gets the entry.
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(_, entry)| entry.value))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn add_to_set(&self, set_key: &str, member: &str, ttl: Duration) -> StorageResult<()> {
        let expires_at = Instant::now() + ttl;
        let mut set = self
            .sets
            .entry(set_key.to_string())
            .or_insert_with(|| SetEntry {
                members: HashSet::new(),
                expires_at,
            });

        if set.is_expired() {
            set.members.clear();
        }
        set.members.insert(member.to_string());
        set.expires_at = expires_at;
        Ok(())
    }

    async fn remove_from_set(&self, set_key: &str, member: &str) -> StorageResult<()> {
        if let Some(mut set) = self.sets.get_mut(set_key) {
            set.members.remove(member);
        }
        self.sets
            .remove_if(set_key, |_, set| set.members.is_empty() || set.is_expired());
        Ok(())
    }

    async fn members(&self, set_key: &str) -> StorageResult<Vec<String>> {
        let members = self
            .sets
            .get(set_key)
            .filter(|set| !set.is_expired())
            .map(|set| set.members.iter().cloned().collect())
            .unwrap_or_default();
        Ok(members)
    }

    async fn delete_set(&self, set_key: &str) -> StorageResult<()> {
        self.sets.remove(set_key);
        Ok(())
    }

    async fn ttl_remaining(&self, key: &str) -> StorageResult<Option<Duration>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            return Ok(entry.expires_at.checked_duration_since(now));
        }
        if let Some(set) = self.sets.get(key) {
            return Ok(set.expires_at.checked_duration_since(now));
        }
        Ok(None)
    }
}

/// Identity store held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    identities: Arc<DashMap<i64, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an identity.
    pub fn insert(&self, identity: Identity) {
        self.identities.insert(identity.id, identity);
    }

    /// Removes an identity, as if the account were deleted.
    pub fn remove(&self, id: i64) -> Option<Identity> {
        self.identities.remove(&id).map(|(_, identity)| identity)
    }

    /// Applies `f` to the stored identity. Returns `false` if it does not exist.
    pub fn update(&self, id: i64, f: impl FnOnce(&mut Identity)) -> bool {
        match self.identities.get_mut(&id) {
            Some(mut identity) => {
                f(identity.value_mut());
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: i64) -> StorageResult<Option<Identity>> {
        Ok(self.identities.get(&id).map(|identity| identity.value().clone()))
    }

    async fn find_by_email(&self, email: &str) -> StorageResult<Option<Identity>> {
        let email = email.trim();
        Ok(self
            .identities
            .iter()
            .find(|identity| identity.email == email)
            .map(|identity| identity.value().clone()))
    }

    async fn increment_token_version(&self, id: i64) -> StorageResult<i64> {
        let mut identity = self
            .identities
            .get_mut(&id)
            .ok_or_else(|| StorageError::unavailable(format!("identity {id} not found")))?;
        identity.token_version += 1;
        Ok(identity.token_version)
    }
}
