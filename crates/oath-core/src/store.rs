//! Concurrent user → credential map.
//!
//! Backed by a `DashMap`, so lookups from different connections proceed
//! in parallel. [`CredentialStore::update`] runs its closure while
//! holding the entry's shard write lock, which is what makes a HOTP
//! read-window-write sequence atomic per user.

use dashmap::DashMap;

use crate::record::CredentialRecord;

/// All provisioned credentials, keyed by user identity.
#[derive(Debug, Default)]
pub struct CredentialStore {
    records: DashMap<String, CredentialRecord>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        CredentialStore::default()
    }

    /// Add or replace the record for `user`, returning any previous one.
    pub fn insert(&self, user: impl Into<String>, record: CredentialRecord) -> Option<CredentialRecord> {
        self.records.insert(user.into(), record)
    }

    /// Run `f` against the record for `user` with shared access.
    pub fn read<R>(&self, user: &str, f: impl FnOnce(&CredentialRecord) -> R) -> Option<R> {
        self.records.get(user).map(|entry| f(entry.value()))
    }

    /// Run `f` against the record for `user` with exclusive access.
    ///
    /// No other reader or writer can observe the record until `f` returns.
    pub fn update<R>(&self, user: &str, f: impl FnOnce(&mut CredentialRecord) -> R) -> Option<R> {
        self.records.get_mut(user).map(|mut entry| f(entry.value_mut()))
    }

    /// Snapshot of a user's record.
    pub fn get(&self, user: &str) -> Option<CredentialRecord> {
        self.read(user, CredentialRecord::clone)
    }

    /// Current HOTP counter for `user`, if any.
    pub fn counter(&self, user: &str) -> Option<u64> {
        self.read(user, CredentialRecord::counter).flatten()
    }

    pub fn contains(&self, user: &str) -> bool {
        self.records.contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, CredentialRecord)> for CredentialStore {
    fn from_iter<I: IntoIterator<Item = (S, CredentialRecord)>>(iter: I) -> Self {
        let store = CredentialStore::new();
        for (user, record) in iter {
            store.insert(user, record);
        }
        store
    }
}
