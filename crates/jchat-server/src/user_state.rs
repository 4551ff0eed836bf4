//! Per-connection user records (§3, §4.6). Grounded on
//! `jchat_server/src/components/user_component.cpp`'s `users_` map, reshaped
//! so the map key is a [`ConnectionId`] rather than a raw client pointer.

use std::collections::HashMap;

use jchat_core::ConnectionId;
use parking_lot::Mutex;

/// A connection's identity. Becomes `enabled` once `System/Hello` succeeds;
/// `identified` once `User/Identify` succeeds (invariant 4 of §3: identified
/// implies enabled).
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub enabled: bool,
    pub identified: bool,
    pub username: String,
    pub hostname: String,
}

/// Registry of all currently-connected users, guarded by a single lock (the
/// reference keeps one map guarded the same way; per-record locking would
/// buy nothing since every operation here also needs to scan for username
/// collisions).
#[derive(Default)]
pub struct UserRegistry {
    users: Mutex<HashMap<ConnectionId, UserRecord>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fresh, unidentified, not-yet-enabled record for a newly
    /// accepted connection.
    pub fn insert(&self, connection_id: ConnectionId, guest_username: String, hostname: String) {
        self.users.lock().insert(
            connection_id,
            UserRecord {
                enabled: false,
                identified: false,
                username: guest_username,
                hostname,
            },
        );
    }

    pub fn remove(&self, connection_id: ConnectionId) {
        self.users.lock().remove(&connection_id);
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<UserRecord> {
        self.users.lock().get(&connection_id).cloned()
    }

    pub fn mark_enabled(&self, connection_id: ConnectionId) -> bool {
        match self.users.lock().get_mut(&connection_id) {
            Some(record) => {
                record.enabled = true;
                true
            }
            None => false,
        }
    }

    /// True iff some other enabled+identified user already holds `username`
    /// (invariant 5 of §3: uniqueness among identified users).
    pub fn username_taken(&self, username: &str) -> bool {
        self.users
            .lock()
            .values()
            .any(|record| record.enabled && record.identified && record.username == username)
    }

    /// Commits a successful identification, replacing the raw hostname with
    /// `hashed_hostname`.
    pub fn identify(&self, connection_id: ConnectionId, username: String, hashed_hostname: String) {
        if let Some(record) = self.users.lock().get_mut(&connection_id) {
            record.identified = true;
            record.username = username;
            record.hostname = hashed_hostname;
        }
    }

    /// Finds the connection id of an enabled+identified user by username,
    /// used to route a direct message to its recipient.
    pub fn find_by_username(&self, username: &str) -> Option<(ConnectionId, UserRecord)> {
        self.users
            .lock()
            .iter()
            .find(|(_, record)| record.enabled && record.identified && record.username == username)
            .map(|(id, record)| (*id, record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_not_enabled_or_identified() {
        let registry = UserRegistry::new();
        let alloc = jchat_core::ConnectionIdAllocator::new();
        let id = alloc.allocate();
        registry.insert(id, "guest-000001".to_string(), "127.0.0.1:1".to_string());

        let record = registry.get(id).unwrap();
        assert!(!record.enabled);
        assert!(!record.identified);
    }

    #[test]
    fn username_uniqueness_ignores_unidentified_users() {
        let registry = UserRegistry::new();
        let alloc = jchat_core::ConnectionIdAllocator::new();
        let id = alloc.allocate();
        registry.insert(id, "alice".to_string(), "h".to_string());

        assert!(!registry.username_taken("alice"));

        registry.mark_enabled(id);
        registry.identify(id, "alice".to_string(), "hashed".to_string());
        assert!(registry.username_taken("alice"));
    }
}
