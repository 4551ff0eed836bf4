//! The single local user record a client holds (§3 "User record (client
//! side)"). Grounded on `jchat_server/src/user_state.rs`'s server-side
//! record, reshaped for exactly one entry instead of a per-connection map.

use parking_lot::Mutex;

/// A snapshot of the local user's identity and connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalUser {
    pub enabled: bool,
    pub identified: bool,
    pub username: String,
    pub hostname: String,
}

/// Guarded holder for the one [`LocalUser`] record a client owns. The
/// System component flips `enabled` (connect resets it to `false`, a
/// successful handshake sets it `true`, disconnect resets it to `false`);
/// the User component owns `identified`/`username`/`hostname` (§9: this
/// repo resolves the spec's literal handshake scenario — enabled becomes
/// true only after `Hello_Complete{Ok}`, not at raw transport connect — by
/// splitting ownership this way; see DESIGN.md).
#[derive(Default)]
pub struct LocalUserState {
    inner: Mutex<LocalUser>,
}

impl LocalUserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> LocalUser {
        self.inner.lock().clone()
    }

    pub fn reset_for_new_connection(&self) {
        let mut guard = self.inner.lock();
        guard.enabled = false;
        guard.identified = false;
        guard.username.clear();
        guard.hostname.clear();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().enabled = enabled;
    }

    pub fn set_disconnected(&self) {
        let mut guard = self.inner.lock();
        guard.enabled = false;
        guard.identified = false;
    }

    pub fn set_identified(&self, username: String, hostname: String) {
        let mut guard = self.inner.lock();
        guard.identified = true;
        guard.username = username;
        guard.hostname = hostname;
    }
}
