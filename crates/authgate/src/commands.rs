//! `/register` and `/login`: the local password path.
//!
//! A player whose login was not remotely verified is let into the play
//! phase without a session. These two commands are the only way to get
//! one. Passwords are bcrypt hashed; hashing and verifying run on the
//! blocking pool because a cost-12 hash takes a few hundred milliseconds.

use std::net::SocketAddr;
use std::sync::Arc;

use authgate_protocol::PlayerId;
use authgate_session::SessionRegistry;
use authgate_store::{CredentialRecord, CredentialStore};

use crate::{AuthgateError, Messages};

/// The player running a command.
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub identity: PlayerId,
    pub name: &'a str,
    /// Connection key; owns any session the command creates.
    pub peer: SocketAddr,
}

/// Runs the login commands against a credential store.
pub struct Commands<S> {
    store: Arc<S>,
    sessions: Arc<SessionRegistry>,
    messages: Arc<Messages>,
    bcrypt_cost: u32,
}

impl<S: CredentialStore> Commands<S> {
    pub fn new(
        store: Arc<S>,
        sessions: Arc<SessionRegistry>,
        messages: Arc<Messages>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            sessions,
            messages,
            bcrypt_cost,
        }
    }

    /// Runs `line` if it is `/login` or `/register`.
    ///
    /// Returns the rendered reply, or `None` if the line is some other
    /// command. Failures inside the store or the hasher are logged and
    /// answered with the generic error text; they never end the
    /// connection.
    pub async fn dispatch(&self, caller: Caller<'_>, line: &str) -> Option<String> {
        let mut words = line.split_whitespace();
        let head = words.next()?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let result = match head.as_str() {
            "/login" => self.login(caller, &args).await,
            "/register" => self.register(caller, &args).await,
            _ => return None,
        };

        let text: &str = match result {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(name = %caller.name, error = %e, %head, "command failed");
                &self.messages.internal_error
            }
        };
        Some(self.messages.render(text))
    }

    async fn login(&self, caller: Caller<'_>, args: &[&str]) -> Result<&str, AuthgateError> {
        let m = &self.messages;
        if self.sessions.is_authenticated(&caller.identity) {
            return Ok(&m.already_logged_in);
        }
        let [password] = args else {
            return Ok(&m.usage_login);
        };

        let Some(hash) = self.store.lookup_password_hash(caller.name).await? else {
            return Ok(&m.not_registered);
        };

        let password = (*password).to_owned();
        let matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
        if !matches {
            tracing::info!(name = %caller.name, peer = %caller.peer, "wrong password");
            return Ok(&m.login_failed);
        }

        self.sessions.create(caller.identity, false, caller.peer);
        tracing::info!(name = %caller.name, "logged in with password");
        Ok(&m.login_success)
    }

    async fn register(&self, caller: Caller<'_>, args: &[&str]) -> Result<&str, AuthgateError> {
        let m = &self.messages;
        if self.sessions.is_authenticated(&caller.identity) {
            return Ok(&m.already_logged_in);
        }
        let [password, confirm] = args else {
            return Ok(&m.usage_register);
        };
        if password != confirm {
            return Ok(&m.password_mismatch);
        }
        if self.store.lookup_password_hash(caller.name).await?.is_some() {
            return Ok(&m.already_registered);
        }

        let password = (*password).to_owned();
        let cost = self.bcrypt_cost;
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;

        self.store
            .upsert_credential(CredentialRecord::local(
                caller.identity,
                caller.name,
                hash,
                Some(caller.peer.ip()),
            ))
            .await?;
        self.sessions.create(caller.identity, false, caller.peer);
        tracing::info!(name = %caller.name, "registered");
        Ok(&m.register_success)
    }
}
