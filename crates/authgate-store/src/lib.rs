//! Credential storage for Authgate.
//!
//! One record per account: identity, display name, optional password
//! hash, whether the identity is remotely verified, and the last address
//! it logged in from.
//!
//! The handshake only ever asks [`CredentialStore::lookup_verified_flag`].
//! Password hashes are read and written by the command layer.

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod memory;
mod record;
mod sqlite;

pub use config::{DatabaseConfig, DatabaseKind};
pub use error::StoreError;
pub use memory::MemoryCredentialStore;
pub use record::CredentialRecord;
pub use sqlite::SqliteCredentialStore;

/// Persistent account records, keyed by identity and looked up by name.
///
/// All methods are async; blocking backends move their work off the
/// runtime threads.
pub trait CredentialStore: Send + Sync + 'static {
    /// `Some(verified)` if `name` has a record, `None` if it doesn't.
    fn lookup_verified_flag(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<bool>, StoreError>> + Send;

    /// The stored password hash for `name`.
    ///
    /// `None` both when there is no record and when the record has no
    /// password (a verified account that never registered one).
    fn lookup_password_hash(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Inserts `record`, or overwrites the password, verified flag and
    /// address of the existing record with the same identity.
    fn upsert_credential(
        &self,
        record: CredentialRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
