//! In-memory backend.

use authgate_protocol::PlayerId;
use dashmap::DashMap;

use crate::{CredentialRecord, CredentialStore, StoreError};

/// Credential store that keeps records in a `DashMap`.
///
/// Never fails. Useful for tests and for servers that don't need
/// registrations to survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: DashMap<PlayerId, CredentialRecord>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates the store.
    pub fn with_records(records: impl IntoIterator<Item = CredentialRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.identity, record);
        }
        store
    }

    /// The record for `name`, if any.
    pub fn find_by_name(&self, name: &str) -> Option<CredentialRecord> {
        self.records
            .iter()
            .find(|entry| entry.display_name == name)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn lookup_verified_flag(
        &self,
        name: &str,
    ) -> Result<Option<bool>, StoreError> {
        Ok(self.find_by_name(name).map(|r| r.verified_identity))
    }

    async fn lookup_password_hash(
        &self,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        Ok(self.find_by_name(name).and_then(|r| r.password_hash))
    }

    async fn upsert_credential(
        &self,
        record: CredentialRecord,
    ) -> Result<(), StoreError> {
        self.records.insert(record.identity, record);
        Ok(())
    }
}
