//! Connection identity and the server-side registry of outbound senders.
//!
//! Per Design Notes (SPEC_FULL.md §9), server-side back-references to a
//! connection are integer ids, never raw transport handles or pointers —
//! this is what lets channel membership survive being copied around
//! between components without use-after-free hazards.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use jchat_wire::Frame;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Issues unique [`ConnectionId`]s for the lifetime of a server process.
#[derive(Debug, Default)]
pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl ConnectionIdAllocator {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    pub fn allocate(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Failed to reach a connection because it is no longer registered (already
/// disconnected) or its outbound channel is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionUnreachable(pub ConnectionId);

impl std::fmt::Display for ConnectionUnreachable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection {} is not reachable", self.0)
    }
}

impl std::error::Error for ConnectionUnreachable {}

/// Maps live connections to a channel that feeds their outbound frame
/// writer task. Shared across every [`crate::Dispatcher`] on a server so
/// that server-only components can multicast.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    senders: Mutex<HashMap<ConnectionId, UnboundedSender<Frame>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self { senders: Mutex::new(HashMap::new()) }
    }

    pub fn insert(&self, id: ConnectionId, sender: UnboundedSender<Frame>) {
        self.senders.lock().insert(id, sender);
    }

    pub fn remove(&self, id: ConnectionId) {
        self.senders.lock().remove(&id);
    }

    pub fn send_to(&self, id: ConnectionId, frame: Frame) -> Result<(), ConnectionUnreachable> {
        let sender = {
            let senders = self.senders.lock();
            senders.get(&id).cloned()
        };
        match sender {
            Some(sender) => sender.send(frame).map_err(|_| ConnectionUnreachable(id)),
            None => Err(ConnectionUnreachable(id)),
        }
    }

    /// Sends the same frame to every id in `targets`, skipping `exclude` if
    /// present. Recipients are snapshotted under the guard and released
    /// before any send is attempted, keeping IO out of the critical section
    /// (SPEC_FULL.md §5).
    pub fn multicast(
        &self,
        targets: impl IntoIterator<Item = ConnectionId>,
        exclude: Option<ConnectionId>,
        frame: Frame,
    ) {
        let recipients: Vec<UnboundedSender<Frame>> = {
            let senders = self.senders.lock();
            targets
                .into_iter()
                .filter(|id| Some(*id) != exclude)
                .filter_map(|id| senders.get(&id).cloned())
                .collect()
        };
        for sender in recipients {
            // A send failure here means that recipient disconnected between
            // the snapshot and now; it will be purged by its own
            // disconnect handling, not by the sender.
            let _ = sender.send(frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_yields_distinct_ids() {
        let alloc = ConnectionIdAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
    }

    #[test]
    fn send_to_unregistered_connection_fails() {
        let registry = ConnectionRegistry::new();
        let result = registry.send_to(ConnectionId(7), Frame::new(0, 0, vec![]));
        assert!(result.is_err());
    }
}
