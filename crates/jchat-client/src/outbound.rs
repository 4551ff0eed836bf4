//! A component-held handle for sending frames outside of the dispatcher's
//! own handler callbacks (§5: "API-invoked outbound requests from the
//! embedder's own thread are thread-safe"). Every client component captures
//! one at `on_connected` and clears it at `on_disconnected`, so that
//! `identify()`, `send_message()`, `join_channel()` and friends can be
//! called from the embedder's REPL thread at any time after the transport
//! comes up.

use std::sync::Arc;

use jchat_core::{ConnectionId, ConnectionRegistry};
use jchat_protocol::ComponentId;
use jchat_wire::{Frame, TypedBuffer};
use parking_lot::Mutex;

/// Returned by an outbound call made before the transport has connected, or
/// after it has disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotConnected;

impl std::fmt::Display for NotConnected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not connected")
    }
}

impl std::error::Error for NotConnected {}

#[derive(Default)]
pub struct OutboundHandle {
    live: Mutex<Option<(ConnectionId, Arc<ConnectionRegistry>)>>,
}

impl OutboundHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, connection_id: ConnectionId, registry: Arc<ConnectionRegistry>) {
        *self.live.lock() = Some((connection_id, registry));
    }

    pub fn clear(&self) {
        *self.live.lock() = None;
    }

    pub fn is_connected(&self) -> bool {
        self.live.lock().is_some()
    }

    pub fn send(&self, component: ComponentId, message_id: u16, body: TypedBuffer) -> Result<(), NotConnected> {
        let guard = self.live.lock();
        let (connection_id, registry) = guard.as_ref().ok_or(NotConnected)?;
        let frame = Frame::new(component.as_u8(), message_id, body.into_vec());
        registry.send_to(*connection_id, frame).map_err(|_| NotConnected)
    }
}
