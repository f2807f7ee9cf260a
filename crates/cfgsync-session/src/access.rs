//! Authorization hook for config mutations.
//!
//! cfgsync doesn't decide who your administrators are. It defines the
//! [`Authorizer`] trait, which maps a caller to a [`Privilege`], and the
//! server consults it before touching the shared sets. A request from a
//! caller without [`Privilege::Admin`] is dropped.
//!
//! Two implementations ship with the crate:
//! - [`AdminList`]: a fixed set of admin ids (plus the server itself).
//! - [`AllowAll`]: everyone is an admin. Handy in tests and local tools.

use std::collections::HashSet;

use cfgsync_protocol::ClientId;
use serde::{Deserialize, Serialize};

/// What a client is allowed to do with the shared configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Privilege {
    /// May subscribe and receive changes, but not make them.
    #[default]
    Subscriber,
    /// May also add, update and remove configs.
    Admin,
}

impl Privilege {
    /// Returns `true` for [`Privilege::Admin`].
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Decides the privilege of a caller.
///
/// Called synchronously from the server's event loop, once per mutation
/// request. Implementations must not block.
///
/// # Example
///
/// ```rust
/// use cfgsync_protocol::ClientId;
/// use cfgsync_session::{Authorizer, Privilege};
///
/// /// Even ids are admins. Only for demos.
/// struct EvenAdmins;
///
/// impl Authorizer for EvenAdmins {
///     fn privilege(&self, caller: ClientId) -> Privilege {
///         if caller.0 % 2 == 0 { Privilege::Admin } else { Privilege::Subscriber }
///     }
/// }
///
/// assert!(EvenAdmins.privilege(ClientId(4)).is_admin());
/// ```
pub trait Authorizer: Send + Sync + 'static {
    /// Returns the privilege `caller` holds right now.
    fn privilege(&self, caller: ClientId) -> Privilege;
}

/// Grants [`Privilege::Admin`] to a fixed set of clients.
///
/// [`ClientId::SERVER`] is always an admin: changes the server makes on
/// its own behalf are never gated.
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    admins: HashSet<ClientId>,
}

impl AdminList {
    /// Creates a list from the given admin ids.
    pub fn new(admins: impl IntoIterator<Item = ClientId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    /// Makes `client` an admin.
    pub fn grant(&mut self, client: ClientId) {
        self.admins.insert(client);
    }

    /// Takes admin rights away from `client`. Returns `true` if it had them.
    pub fn revoke(&mut self, client: ClientId) -> bool {
        self.admins.remove(&client)
    }
}

impl Authorizer for AdminList {
    fn privilege(&self, caller: ClientId) -> Privilege {
        if caller == ClientId::SERVER || self.admins.contains(&caller) {
            Privilege::Admin
        } else {
            Privilege::Subscriber
        }
    }
}

/// Treats every caller as an admin.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn privilege(&self, _caller: ClientId) -> Privilege {
        Privilege::Admin
    }
}
