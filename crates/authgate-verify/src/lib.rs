//! Identity verification for Authgate.
//!
//! Talks to the remote identity authority over HTTP. Two questions are
//! asked of it during a login:
//!
//! 1. *Does this name belong to a verified account?* Asked only for names
//!    the credential store has never seen.
//! 2. *Did the client holding this name really complete this key
//!    exchange?* Asked with the session hash at the end of the verified
//!    path.
//!
//! The handshake only sees the [`IdentityAuthority`] trait, whose methods
//! cannot fail: every error collapses to "no" at this boundary.

#![allow(async_fn_in_trait)]

mod authority;
mod config;
mod error;
mod http;
mod id;

pub use authority::{ConfirmedIdentity, IdentityAuthority};
pub use config::AuthorityConfig;
pub use error::VerifyError;
pub use http::HttpIdentityAuthority;
pub use id::{hyphenate_id, parse_profile_id};
