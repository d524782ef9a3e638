//! `AuthgateServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → handshake → session,
//! with the command layer and access filter on top for the play phase.

use std::sync::Arc;
use std::time::Duration;

use authgate_crypto::ServerKeyPair;
use authgate_handshake::HandshakeMachine;
use authgate_protocol::{Codec, JsonCodec};
use authgate_session::SessionRegistry;
use authgate_store::CredentialStore;
use authgate_transport::{Transport, WebSocketTransport};
use authgate_verify::IdentityAuthority;

use crate::commands::Commands;
use crate::filter::AccessFilter;
use crate::handler::handle_connection;
use crate::online::OnlinePlayers;
use crate::{AuthgateConfig, AuthgateError, Messages};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S, A, C> {
    pub(crate) machine: HandshakeMachine<S, A>,
    pub(crate) sessions: Arc<SessionRegistry>,
    pub(crate) online: Arc<OnlinePlayers>,
    pub(crate) commands: Commands<S>,
    pub(crate) filter: AccessFilter,
    pub(crate) messages: Arc<Messages>,
    pub(crate) codec: C,
    pub(crate) login_timeout: Option<Duration>,
}

/// Builder for configuring and starting an Authgate server.
///
/// # Example
///
/// ```rust,ignore
/// use authgate::prelude::*;
///
/// let server = AuthgateServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(store, authority)
///     .await?;
/// server.run().await
/// ```
pub struct AuthgateServerBuilder {
    bind_addr: String,
    login_timeout: Option<Duration>,
    bcrypt_cost: u32,
    forward_client_ip: bool,
    messages: Messages,
    keys: Option<Arc<ServerKeyPair>>,
}

impl AuthgateServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&AuthgateConfig::default())
    }

    /// Creates a builder from the parts of `config` the server owns.
    ///
    /// The store and the authority client are built by the caller from
    /// the `[database]` and `[authority]` sections.
    pub fn from_config(config: &AuthgateConfig) -> Self {
        Self {
            bind_addr: config.server.bind.clone(),
            login_timeout: config.server.login_timeout(),
            bcrypt_cost: config.security.bcrypt_cost,
            forward_client_ip: config.authority.send_client_ip,
            messages: config.messages.clone(),
            keys: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Bounds the login phase. `None` lets a connection sit in it forever.
    pub fn login_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// bcrypt work factor for `/register`.
    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Passes the player's address to the identity authority.
    pub fn forward_client_ip(mut self, enabled: bool) -> Self {
        self.forward_client_ip = enabled;
        self
    }

    pub fn messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Uses an existing key pair instead of generating one at build time.
    pub fn keys(mut self, keys: Arc<ServerKeyPair>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Binds the listener and assembles the shared state.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<S, A>(
        self,
        store: S,
        authority: A,
    ) -> Result<AuthgateServer<S, A, JsonCodec>, AuthgateError>
    where
        S: CredentialStore,
        A: IdentityAuthority,
    {
        let keys = match self.keys {
            Some(keys) => keys,
            None => Arc::new(tokio::task::spawn_blocking(ServerKeyPair::generate).await??),
        };
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let store = Arc::new(store);
        let sessions = Arc::new(SessionRegistry::new());
        let messages = Arc::new(self.messages);
        let machine = HandshakeMachine::new(
            keys,
            Arc::clone(&store),
            Arc::new(authority),
            Arc::clone(&sessions),
        )
        .forward_client_ip(self.forward_client_ip);
        let commands = Commands::new(
            store,
            Arc::clone(&sessions),
            Arc::clone(&messages),
            self.bcrypt_cost,
        );

        let state = Arc::new(ServerState {
            machine,
            filter: AccessFilter::new(Arc::clone(&sessions)),
            sessions,
            online: Arc::new(OnlinePlayers::new()),
            commands,
            messages,
            codec: JsonCodec,
            login_timeout: self.login_timeout,
        });

        Ok(AuthgateServer { transport, state })
    }
}

impl Default for AuthgateServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Authgate server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct AuthgateServer<S, A, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, A, C>>,
}

impl AuthgateServer<(), (), JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> AuthgateServerBuilder {
        AuthgateServerBuilder::new()
    }
}

impl<S, A, C> AuthgateServer<S, A, C>
where
    S: CredentialStore,
    A: IdentityAuthority,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The registry of logged-in players.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.state.sessions)
    }

    /// Which connection each joined identity is playing on.
    pub fn online(&self) -> Arc<OnlinePlayers> {
        Arc::clone(&self.state.online)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), AuthgateError> {
        tracing::info!("Authgate server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
