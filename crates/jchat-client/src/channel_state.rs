//! The client's mirror of channels it has joined (§3, §4.9): for each, a
//! roster of members (with operator flag) and the ban list the server last
//! reported. Grounded on `jchat_server/src/channel_state.rs`'s `Channel`,
//! reshaped to a passive mirror with no locks of its own finer than the
//! top-level map (a client only ever touches its own joined set, so there
//! is no multicast fan-out to keep out of a critical section).

use std::collections::HashMap;

use parking_lot::Mutex;

/// One member of a mirrored channel roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMember {
    pub username: String,
    pub hostname: String,
    pub is_operator: bool,
}

/// A channel the local user currently believes it has joined.
#[derive(Debug, Clone, Default)]
pub struct MirroredChannel {
    pub members: Vec<ChannelMember>,
    pub bans: Vec<String>,
}

impl MirroredChannel {
    fn member_index(&self, username: &str) -> Option<usize> {
        self.members.iter().position(|m| m.username == username)
    }

    fn remove_member(&mut self, username: &str) {
        if let Some(index) = self.member_index(username) {
            self.members.remove(index);
        }
    }
}

/// All channels the local user is currently a member of, keyed by name.
#[derive(Default)]
pub struct ChannelMirror {
    channels: Mutex<HashMap<String, MirroredChannel>>,
}

impl ChannelMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, name: &str) -> Option<MirroredChannel> {
        self.channels.lock().get(name).cloned()
    }

    pub fn joined_channel_names(&self) -> Vec<String> {
        self.channels.lock().keys().cloned().collect()
    }

    pub fn is_joined(&self, name: &str) -> bool {
        self.channels.lock().contains_key(name)
    }

    /// Records a freshly-created channel with the local user as its sole
    /// member and operator.
    pub fn insert_created(&self, name: &str, local_username: &str, local_hostname: &str) {
        self.channels.lock().insert(
            name.to_string(),
            MirroredChannel {
                members: vec![ChannelMember {
                    username: local_username.to_string(),
                    hostname: local_hostname.to_string(),
                    is_operator: true,
                }],
                bans: Vec::new(),
            },
        );
    }

    /// Records a successful join of an existing channel: the local user
    /// plus every other member the server reported, and the current ban
    /// list.
    pub fn insert_joined(
        &self,
        name: &str,
        local_username: &str,
        local_hostname: &str,
        others: Vec<ChannelMember>,
        bans: Vec<String>,
    ) {
        let mut members = vec![ChannelMember {
            username: local_username.to_string(),
            hostname: local_hostname.to_string(),
            is_operator: false,
        }];
        members.extend(others);
        self.channels.lock().insert(name.to_string(), MirroredChannel { members, bans });
    }

    /// Removes the channel entirely — the local user left, was kicked, or
    /// was banned from it.
    pub fn remove(&self, name: &str) {
        self.channels.lock().remove(name);
    }

    pub fn add_remote_member(&self, name: &str, username: &str, hostname: &str) {
        if let Some(channel) = self.channels.lock().get_mut(name) {
            channel.members.push(ChannelMember {
                username: username.to_string(),
                hostname: hostname.to_string(),
                is_operator: false,
            });
        }
    }

    pub fn remove_remote_member(&self, name: &str, username: &str) {
        if let Some(channel) = self.channels.lock().get_mut(name) {
            channel.remove_member(username);
        }
    }

    pub fn set_operator(&self, name: &str, username: &str, is_operator: bool) {
        if let Some(channel) = self.channels.lock().get_mut(name)
            && let Some(member) = channel.members.iter_mut().find(|m| m.username == username)
        {
            member.is_operator = is_operator;
        }
    }

    pub fn add_ban(&self, name: &str, username: &str, hostname: &str) {
        if let Some(channel) = self.channels.lock().get_mut(name) {
            channel.bans.push(format!("{username}@{hostname}"));
        }
    }

    pub fn remove_ban(&self, name: &str, username: &str) {
        if let Some(channel) = self.channels.lock().get_mut(name) {
            let prefix = format!("{username}@");
            channel.bans.retain(|token| !token.starts_with(&prefix));
        }
    }

    /// Drops every mirrored channel, used when the transport disconnects
    /// (the server's own membership is gone too, so nothing is left to
    /// mirror).
    pub fn clear(&self) {
        self.channels.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_channel_has_local_user_as_sole_operator() {
        let mirror = ChannelMirror::new();
        mirror.insert_created("#lobby", "alice", "deadbeef");
        let snap = mirror.snapshot("#lobby").unwrap();
        assert_eq!(snap.members.len(), 1);
        assert!(snap.members[0].is_operator);
    }

    #[test]
    fn joining_merges_local_user_with_reported_roster() {
        let mirror = ChannelMirror::new();
        mirror.insert_joined(
            "#lobby",
            "bob",
            "cafebabe",
            vec![ChannelMember { username: "alice".to_string(), hostname: "deadbeef".to_string(), is_operator: true }],
            vec!["eve@badbad".to_string()],
        );
        let snap = mirror.snapshot("#lobby").unwrap();
        assert_eq!(snap.members.len(), 2);
        assert_eq!(snap.bans, vec!["eve@badbad".to_string()]);
    }

    #[test]
    fn leaving_removes_the_channel_entirely() {
        let mirror = ChannelMirror::new();
        mirror.insert_created("#lobby", "alice", "deadbeef");
        mirror.remove("#lobby");
        assert!(!mirror.is_joined("#lobby"));
    }

    #[test]
    fn remote_member_join_and_part_update_the_roster() {
        let mirror = ChannelMirror::new();
        mirror.insert_created("#lobby", "alice", "deadbeef");
        mirror.add_remote_member("#lobby", "bob", "cafebabe");
        assert_eq!(mirror.snapshot("#lobby").unwrap().members.len(), 2);

        mirror.remove_remote_member("#lobby", "bob");
        assert_eq!(mirror.snapshot("#lobby").unwrap().members.len(), 1);
    }
}
