//! The narrow cross-component contract the channel component needs from the
//! user component: looking up a connection's current identity without
//! reaching into the user component's internals (§9 — replaces the
//! reference's raw same-process pointer lookup with an explicit trait).

use jchat_core::ConnectionId;

/// A snapshot of a connection's identity at the moment of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub username: String,
    pub hostname: String,
    pub identified: bool,
}

/// Implemented by the server's user component; consumed by the system and
/// channel components so they never need to know how user records are
/// stored.
pub trait UserDirectory: Send + Sync {
    /// Looks up the identity of a currently-connected user by connection id.
    /// Returns `None` if the connection is unknown (already disconnected).
    fn identity_of(&self, connection_id: ConnectionId) -> Option<UserIdentity>;

    /// True iff `connection_id` has completed `Identify` successfully.
    fn is_identified(&self, connection_id: ConnectionId) -> bool {
        self.identity_of(connection_id).is_some_and(|identity| identity.identified)
    }

    /// Marks a user record enabled after a successful `System/Hello`
    /// handshake. Returns `false` if the connection has no record (internal
    /// invariant violation — the caller should treat this as fatal).
    fn mark_enabled(&self, connection_id: ConnectionId) -> bool;
}
