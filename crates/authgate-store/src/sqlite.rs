//! SQLite backend.
//!
//! ```text
//! authgate_users
//!   uuid      TEXT PRIMARY KEY   -- hyphenated identity
//!   username  TEXT NOT NULL
//!   password  TEXT               -- bcrypt, NULL for verified accounts
//!   premium   INTEGER NOT NULL   -- 1 = remotely verified
//!   ip        TEXT               -- last known address
//! ```
//!
//! `rusqlite` is synchronous, so every call runs on Tokio's blocking pool
//! with the connection behind a `Mutex`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use authgate_protocol::PlayerId;
use rusqlite::{Connection, OptionalExtension, params};

use crate::{CredentialRecord, CredentialStore, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS authgate_users (
    uuid     TEXT PRIMARY KEY NOT NULL,
    username TEXT NOT NULL,
    password TEXT,
    premium  INTEGER NOT NULL DEFAULT 0,
    ip       TEXT
);
CREATE INDEX IF NOT EXISTS authgate_users_username ON authgate_users (username);";

/// Credential store backed by a single SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(StoreError::Open)?;
        Self::init(conn)
    }

    /// A private in-memory database, gone when the store is dropped.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Open)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(StoreError::Open)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&guard)
        })
        .await?
    }
}

impl CredentialStore for SqliteCredentialStore {
    async fn lookup_verified_flag(
        &self,
        name: &str,
    ) -> Result<Option<bool>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let flag = conn
                .query_row(
                    "SELECT premium FROM authgate_users WHERE username = ?1 LIMIT 1",
                    params![name],
                    |row| row.get::<_, bool>(0),
                )
                .optional()?;
            Ok(flag)
        })
        .await
    }

    async fn lookup_password_hash(
        &self,
        name: &str,
    ) -> Result<Option<String>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let hash = conn
                .query_row(
                    "SELECT password FROM authgate_users WHERE username = ?1 LIMIT 1",
                    params![name],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?;
            Ok(hash.flatten())
        })
        .await
    }

    async fn upsert_credential(
        &self,
        record: CredentialRecord,
    ) -> Result<(), StoreError> {
        let identity = record.identity;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO authgate_users (uuid, username, password, premium, ip)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(uuid) DO UPDATE SET
                     username = excluded.username,
                     password = excluded.password,
                     premium  = excluded.premium,
                     ip       = excluded.ip",
                params![
                    record.identity.to_string(),
                    record.display_name,
                    record.password_hash,
                    record.verified_identity,
                    record.last_known_address.map(|ip| ip.to_string()),
                ],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(%identity, "credential upserted");
        Ok(())
    }
}

impl SqliteCredentialStore {
    /// Reads back the full record for `name`. Used by operators and tests;
    /// the login path only needs the narrower lookups.
    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT uuid, username, password, premium, ip
                     FROM authgate_users WHERE username = ?1 LIMIT 1",
                    params![name],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, bool>(3)?,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((uuid, display_name, password_hash, verified, ip)) = row else {
                return Ok(None);
            };
            let corrupt = |message: String| StoreError::Corrupt {
                name: display_name.clone(),
                message,
            };
            let identity = uuid
                .parse()
                .map(PlayerId)
                .map_err(|e: uuid::Error| corrupt(e.to_string()))?;
            let last_known_address = ip
                .map(|ip| ip.parse())
                .transpose()
                .map_err(|e: std::net::AddrParseError| corrupt(e.to_string()))?;

            Ok(Some(CredentialRecord {
                identity,
                display_name,
                password_hash,
                verified_identity: verified,
                last_known_address,
            }))
        })
        .await
    }
}
