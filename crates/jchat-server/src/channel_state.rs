//! Channels: membership, operators, and bans (§3, §4.8). Grounded on
//! `jchat_server/src/components/channel_component.cpp`'s `ChatChannel`, with
//! connection ids standing in for raw client pointers (§9).

use std::collections::HashSet;

use jchat_core::ConnectionId;
use parking_lot::Mutex;

/// One joined channel. Field-level locks mirror the reference's separate
/// `ClientsMutex`/`OperatorsMutex`/`BannedUsersMutex`, acquired in the
/// channels → members → operators → bans order documented in SPEC_FULL.md §5.
pub struct Channel {
    pub name: String,
    members: Mutex<HashSet<ConnectionId>>,
    operators: Mutex<HashSet<ConnectionId>>,
    bans: Mutex<Vec<String>>,
}

impl Channel {
    fn new(name: String, founder: ConnectionId) -> Self {
        let mut members = HashSet::new();
        members.insert(founder);
        let mut operators = HashSet::new();
        operators.insert(founder);
        Self {
            name,
            members: Mutex::new(members),
            operators: Mutex::new(operators),
            bans: Mutex::new(Vec::new()),
        }
    }

    pub fn is_member(&self, connection_id: ConnectionId) -> bool {
        self.members.lock().contains(&connection_id)
    }

    pub fn is_operator(&self, connection_id: ConnectionId) -> bool {
        self.operators.lock().contains(&connection_id)
    }

    pub fn is_banned(&self, ban_token: &str) -> bool {
        self.bans.lock().iter().any(|token| token == ban_token)
    }

    /// Every member except `exclude`, snapshotted for multicast (§5: release
    /// the guard before sending).
    pub fn other_members(&self, exclude: ConnectionId) -> Vec<ConnectionId> {
        self.members.lock().iter().copied().filter(|id| *id != exclude).collect()
    }

    pub fn all_members(&self) -> Vec<ConnectionId> {
        self.members.lock().iter().copied().collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    pub fn add_member(&self, connection_id: ConnectionId) {
        self.members.lock().insert(connection_id);
    }

    pub fn remove_member(&self, connection_id: ConnectionId) {
        self.members.lock().remove(&connection_id);
        self.operators.lock().remove(&connection_id);
    }

    pub fn add_operator(&self, connection_id: ConnectionId) {
        self.operators.lock().insert(connection_id);
    }

    pub fn remove_operator(&self, connection_id: ConnectionId) {
        self.operators.lock().remove(&connection_id);
    }

    pub fn add_ban(&self, ban_token: String) {
        self.bans.lock().push(ban_token);
    }

    /// Removes the first ban token matching `username@` and returns the
    /// full token (carrying the hashed hostname) if one matched.
    pub fn remove_ban_by_username(&self, username: &str) -> Option<String> {
        let prefix = format!("{username}@");
        let mut bans = self.bans.lock();
        let index = bans.iter().position(|token| token.starts_with(&prefix))?;
        Some(bans.remove(index))
    }

    pub fn ban_tokens(&self) -> Vec<String> {
        self.bans.lock().clone()
    }
}

/// All live channels, guarded by one lock (channel creation/destruction and
/// lookups by name are rare relative to per-channel traffic, so a single
/// registry lock is not a contention hot spot).
#[derive(Default)]
pub struct ChannelRegistry {
    channels: Mutex<Vec<std::sync::Arc<Channel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<std::sync::Arc<Channel>> {
        self.channels.lock().iter().find(|c| c.name == name).cloned()
    }

    /// Creates a channel with `founder` as its sole member and operator,
    /// returning the new channel (invariant 1 of §3: a channel is enabled
    /// iff non-empty, so creation always starts non-empty).
    pub fn create(&self, name: String, founder: ConnectionId) -> std::sync::Arc<Channel> {
        let channel = std::sync::Arc::new(Channel::new(name, founder));
        self.channels.lock().push(channel.clone());
        channel
    }

    /// Drops a channel once it has become empty.
    pub fn remove_if_empty(&self, name: &str) {
        self.channels.lock().retain(|c| c.name != name || c.member_count() > 0);
    }

    /// Every channel `connection_id` currently belongs to, for disconnect
    /// purge (§8 property 5).
    pub fn channels_containing(&self, connection_id: ConnectionId) -> Vec<std::sync::Arc<Channel>> {
        self.channels.lock().iter().filter(|c| c.is_member(connection_id)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jchat_core::ConnectionIdAllocator;

    #[test]
    fn creating_a_channel_makes_the_founder_sole_member_and_operator() {
        let alloc = ConnectionIdAllocator::new();
        let founder = alloc.allocate();
        let registry = ChannelRegistry::new();
        let channel = registry.create("#lobby".to_string(), founder);

        assert!(channel.is_member(founder));
        assert!(channel.is_operator(founder));
        assert_eq!(channel.member_count(), 1);
    }

    #[test]
    fn empty_channel_is_removed() {
        let alloc = ConnectionIdAllocator::new();
        let founder = alloc.allocate();
        let registry = ChannelRegistry::new();
        let channel = registry.create("#lobby".to_string(), founder);
        channel.remove_member(founder);
        registry.remove_if_empty("#lobby");

        assert!(registry.find("#lobby").is_none());
    }

    #[test]
    fn ban_token_round_trips_by_username() {
        let registry = ChannelRegistry::new();
        let alloc = ConnectionIdAllocator::new();
        let founder = alloc.allocate();
        let channel = registry.create("#lobby".to_string(), founder);

        channel.add_ban("bob@deadbeef".to_string());
        assert!(channel.is_banned("bob@deadbeef"));

        let removed = channel.remove_ban_by_username("bob").unwrap();
        assert_eq!(removed, "bob@deadbeef");
        assert!(!channel.is_banned("bob@deadbeef"));
    }
}
