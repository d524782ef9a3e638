//! The seam between the handshake and whoever vouches for identities.

use std::net::IpAddr;

use authgate_protocol::{PlayerId, ProfileProperty};

/// A profile the authority has confirmed for one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedIdentity {
    /// Canonical id; replaces whatever the client claimed.
    pub id: PlayerId,
    /// Canonical spelling of the name.
    pub name: String,
    /// Signed profile properties, passed through untouched.
    pub properties: Vec<ProfileProperty>,
}

/// Remote identity authority as the handshake sees it.
///
/// Neither method can fail. Network errors, timeouts and unexpected
/// answers are all reported as "no". The existence
/// probe therefore fails towards the local path and confirmation fails
/// towards rejection.
///
/// Implemented by [`HttpIdentityAuthority`](crate::HttpIdentityAuthority)
/// in production and by in-memory fakes in tests.
pub trait IdentityAuthority: Send + Sync + 'static {
    /// `true` iff the authority knows a verified account called `name`.
    fn identity_exists(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = bool> + Send;

    /// Confirms that the client logging in as `name` joined a session
    /// identified by `session_hash`.
    ///
    /// `ip` is the client's address when the server is configured to
    /// forward it.
    fn confirm_identity(
        &self,
        name: &str,
        session_hash: &str,
        ip: Option<IpAddr>,
    ) -> impl std::future::Future<Output = Option<ConfirmedIdentity>> + Send;
}
