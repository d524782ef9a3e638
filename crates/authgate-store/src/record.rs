use std::net::IpAddr;

use authgate_protocol::PlayerId;

/// One account as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub identity: PlayerId,
    pub display_name: String,
    /// bcrypt hash; `None` for accounts without a local password.
    pub password_hash: Option<String>,
    pub verified_identity: bool,
    pub last_known_address: Option<IpAddr>,
}

impl CredentialRecord {
    /// A locally registered account with a password.
    pub fn local(
        identity: PlayerId,
        display_name: impl Into<String>,
        password_hash: impl Into<String>,
        address: Option<IpAddr>,
    ) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            password_hash: Some(password_hash.into()),
            verified_identity: false,
            last_known_address: address,
        }
    }

    /// A remotely verified account, with no password.
    pub fn verified(
        identity: PlayerId,
        display_name: impl Into<String>,
        address: Option<IpAddr>,
    ) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            password_hash: None,
            verified_identity: true,
            last_known_address: address,
        }
    }
}
