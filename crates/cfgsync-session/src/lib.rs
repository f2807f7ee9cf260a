//! Subscriber sessions and authorization for cfgsync.
//!
//! This crate answers two questions for the server:
//!
//! 1. **Who may change the shared configs?**: the [`Authorizer`] trait
//!    maps a [`ClientId`](cfgsync_protocol::ClientId) to a [`Privilege`].
//! 2. **Who is listening?**: the [`SessionManager`] tracks which clients
//!    are attached to the shared object, and whether an attach is a
//!    first contact or a resync after a disconnect.
//!
//! # How it fits in the stack
//!
//! ```text
//! Server sync (above)  ← asks "is this caller an admin?" and "who gets the broadcast?"
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Protocol (below)     ← provides ClientId
//! ```

mod access;
mod error;
mod manager;
mod session;

pub use access::{AdminList, AllowAll, Authorizer, Privilege};
pub use error::SessionError;
pub use manager::{Attach, SessionManager};
pub use session::{Session, SessionConfig, SessionState};
