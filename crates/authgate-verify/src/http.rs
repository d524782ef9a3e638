//! HTTP implementation of [`IdentityAuthority`].
//!
//! ```text
//! GET {base}/profile/lookup?name=<name>
//!     200          → exists
//!     anything else → does not exist
//!
//! GET {base}/session/confirm?username=<name>&sessionHash=<hash>[&ip=<ip>]
//!     200 {id, name, properties} → confirmed
//!     204                        → not confirmed
//!     anything else              → failure
//! ```

use std::net::IpAddr;
use std::time::Duration;

use authgate_protocol::ProfileProperty;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::{
    AuthorityConfig, ConfirmedIdentity, IdentityAuthority, VerifyError,
    parse_profile_id,
};

const USER_AGENT: &str = concat!("authgate/", env!("CARGO_PKG_VERSION"));

/// Body of a successful confirmation.
#[derive(Debug, Deserialize)]
struct ProfileBody {
    id: String,
    name: String,
    #[serde(default)]
    properties: Vec<ProfileProperty>,
}

/// Identity authority reached over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpIdentityAuthority {
    client: Client,
    lookup_url: Url,
    confirm_url: Url,
    lookup_timeout: Duration,
    confirm_timeout: Duration,
}

impl HttpIdentityAuthority {
    /// Builds a client for the authority described by `config`.
    ///
    /// # Errors
    /// [`VerifyError::InvalidBaseUrl`] if `base_url` doesn't parse,
    /// [`VerifyError::Client`] if the TLS backend can't be initialised.
    pub fn new(config: &AuthorityConfig) -> Result<Self, VerifyError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(VerifyError::Client)?;
        Self::with_client(client, config)
    }

    /// Like [`new`](Self::new) but reuses an existing `reqwest` client.
    pub fn with_client(
        client: Client,
        config: &AuthorityConfig,
    ) -> Result<Self, VerifyError> {
        let invalid = |message: String| VerifyError::InvalidBaseUrl {
            url: config.base_url.clone(),
            message,
        };

        let mut base =
            Url::parse(&config.base_url).map_err(|e| invalid(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let lookup_url = base
            .join("profile/lookup")
            .map_err(|e| invalid(e.to_string()))?;
        let confirm_url = base
            .join("session/confirm")
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            client,
            lookup_url,
            confirm_url,
            lookup_timeout: config.lookup_timeout(),
            confirm_timeout: config.confirm_timeout(),
        })
    }

    /// Existence probe with the error kept.
    pub async fn try_identity_exists(
        &self,
        name: &str,
    ) -> Result<bool, VerifyError> {
        let response = self
            .client
            .get(self.lookup_url.clone())
            .query(&[("name", name)])
            .timeout(self.lookup_timeout)
            .send()
            .await
            .map_err(VerifyError::RemoteUnavailable)?;

        let status = response.status();
        tracing::debug!(%name, %status, "profile lookup answered");
        if status == StatusCode::OK {
            Ok(true)
        } else if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(VerifyError::Status(status))
        }
    }

    /// Identity confirmation with the error kept.
    ///
    /// `Ok(None)` means the authority answered and said no (204).
    pub async fn try_confirm_identity(
        &self,
        name: &str,
        session_hash: &str,
        ip: Option<IpAddr>,
    ) -> Result<Option<ConfirmedIdentity>, VerifyError> {
        let mut query = vec![
            ("username", name.to_string()),
            ("sessionHash", session_hash.to_string()),
        ];
        if let Some(ip) = ip {
            query.push(("ip", ip.to_string()));
        }

        let response = self
            .client
            .get(self.confirm_url.clone())
            .query(&query)
            .timeout(self.confirm_timeout)
            .send()
            .await
            .map_err(VerifyError::RemoteUnavailable)?;

        let status = response.status();
        tracing::debug!(%name, %status, "session confirmation answered");
        match status {
            StatusCode::OK => {}
            StatusCode::NO_CONTENT => return Ok(None),
            other => return Err(VerifyError::Status(other)),
        }

        let body: ProfileBody = response
            .json()
            .await
            .map_err(|e| VerifyError::MalformedProfile(e.to_string()))?;
        let id = parse_profile_id(&body.id)?;

        Ok(Some(ConfirmedIdentity {
            id,
            name: body.name,
            properties: body.properties,
        }))
    }
}

impl IdentityAuthority for HttpIdentityAuthority {
    async fn identity_exists(&self, name: &str) -> bool {
        match self.try_identity_exists(name).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(%name, error = %e, "profile lookup failed, treating as unknown");
                false
            }
        }
    }

    async fn confirm_identity(
        &self,
        name: &str,
        session_hash: &str,
        ip: Option<IpAddr>,
    ) -> Option<ConfirmedIdentity> {
        match self.try_confirm_identity(name, session_hash, ip).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                tracing::warn!(%name, error = %e, "session confirmation failed");
                None
            }
        }
    }
}
