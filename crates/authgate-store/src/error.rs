//! Error types for credential storage.

/// Errors from a [`CredentialStore`](crate::CredentialStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database file could not be opened or its schema created.
    #[error("failed to open credential database: {0}")]
    Open(#[source] rusqlite::Error),

    /// A statement failed.
    #[error("credential query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A previous holder of the connection panicked.
    #[error("credential store lock poisoned")]
    LockPoisoned,

    /// The blocking task running the query was cancelled or panicked.
    #[error("credential store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A stored row could not be turned back into a record.
    #[error("corrupt credential for {name}: {message}")]
    Corrupt { name: String, message: String },
}
