//! Authenticated session tracking for Authgate.
//!
//! ```text
//! Access filter / commands (above)  ← ask "is this player logged in?"
//!     ↕
//! Session Layer (this crate)        ← SessionRegistry
//!     ↕
//! Handshake (beside)                ← creates verified sessions
//! ```
//!
//! The registry is the only long-lived mutable state shared between
//! connections. Everything else about a login is per-connection and lives
//! in the handshake crate.

mod registry;
mod session;

pub use registry::SessionRegistry;
pub use session::Session;
