//! Error types for the verification client.

use reqwest::StatusCode;

/// Why a call to the identity authority did not produce an answer.
///
/// These never cross the [`IdentityAuthority`](crate::IdentityAuthority)
/// boundary. They are logged and turned into `false` / `None` there, and
/// are only visible through the `try_*` methods of
/// [`HttpIdentityAuthority`](crate::HttpIdentityAuthority).
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The configured base URL is not a usable URL.
    #[error("invalid authority url {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connect failure, timeout, or broken response stream.
    #[error("identity authority unreachable: {0}")]
    RemoteUnavailable(#[source] reqwest::Error),

    /// The authority answered with a status we don't treat as an answer.
    #[error("identity authority returned unexpected status {0}")]
    Status(StatusCode),

    /// A 200 response whose body isn't a profile.
    #[error("malformed profile: {0}")]
    MalformedProfile(String),

    /// The profile id is not a UUID in either accepted form.
    #[error("invalid profile id {0:?}")]
    InvalidId(String),
}
