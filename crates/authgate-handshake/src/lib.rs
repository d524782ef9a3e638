//! Login handshake interception for Authgate.
//!
//! Sits between the transport and the rest of the server. Every
//! `LoginStart` a client sends is offered to the [`HandshakeMachine`]
//! first, which either lets it through or holds it:
//!
//! ```text
//!                        LoginStart(name)
//!                              │
//!                   ticket for (name, conn)? ──yes──→ Pass (consumes ticket)
//!                              │ no
//!                           HELD (pending[name], connections[addr])
//!                              │
//!              credential store / existence probe
//!                 ┌────────────┴─────────────┐
//!              local                      verified
//!                 │                          │
//!       ticket + reinject           EncryptionRequest(pk, token)
//!                                            │  CHALLENGED
//!                                   EncryptionResponse
//!                                            │  CONFIRMING
//!                                  decrypt, check token, hash
//!                                            │
//!                                   authority.confirm_identity
//!                                 ┌──────────┴──────────┐
//!                               Some                   None
//!                                 │                     │
//!              rewrite id, ticket, session,          REJECTED
//!                     reinject
//! ```
//!
//! A re-injected message comes back through the machine, finds its
//! ticket and passes. That is what makes forwarding exactly-once: the
//! ticket is the only way past, and it is consumed on first use.

#![allow(async_fn_in_trait)]

mod channel;
mod error;
mod machine;
mod pending;

pub use channel::LoginChannel;
pub use error::{HandshakeError, reasons};
pub use machine::{HandshakeMachine, SERVER_ID, Verdict};
pub use pending::Resolution;
