//! The component trait every protocol subsystem (System, User, Channel)
//! implements, and the context a [`crate::Dispatcher`] hands to handlers so
//! they can reply and, server-side, multicast.

use std::sync::Arc;

use async_trait::async_trait;
use jchat_protocol::ComponentId;
use jchat_wire::{Frame, TypedBuffer};

use crate::connection::{ConnectionId, ConnectionRegistry};

/// Fatal errors a handler or the dispatcher itself can raise. Per
/// SPEC_FULL.md §7, domain rejections are *not* errors — they are ordinary
/// successful handler returns that wrote a non-`Ok` result code into the
/// reply frame. Only framing and internal-invariant failures reach this
/// type, and every one of them causes the dispatcher to drop the
/// connection.
#[derive(Debug)]
pub enum DispatchError {
    UnknownComponent(u8),
    UnknownMessage { component: ComponentId, message_id: u16 },
    BadPayload(jchat_wire::TypedReadError),
    /// A `_Complete`/unsolicited body carried a result code outside the
    /// component's closed enumeration (§6) — treated the same as any other
    /// framing failure: fatal, since a conforming peer never sends one.
    UnknownResultCode(Box<dyn std::error::Error + Send + Sync + 'static>),
    Unreachable(crate::connection::ConnectionUnreachable),
    Io(std::io::Error),
}

impl DispatchError {
    pub fn unknown_result_code(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        DispatchError::UnknownResultCode(Box::new(e))
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::UnknownComponent(id) => write!(f, "unknown component id {id}"),
            DispatchError::UnknownMessage { component, message_id } => {
                write!(f, "component {component} does not recognize message id {message_id}")
            }
            DispatchError::BadPayload(e) => write!(f, "bad payload: {e}"),
            DispatchError::UnknownResultCode(e) => write!(f, "unknown result code: {e}"),
            DispatchError::Unreachable(e) => write!(f, "{e}"),
            DispatchError::Io(e) => write!(f, "transport io error: {e}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::BadPayload(e) => Some(e),
            DispatchError::UnknownResultCode(e) => Some(e.as_ref()),
            DispatchError::Unreachable(e) => Some(e),
            DispatchError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jchat_wire::TypedReadError> for DispatchError {
    fn from(e: jchat_wire::TypedReadError) -> Self {
        DispatchError::BadPayload(e)
    }
}

impl From<crate::connection::ConnectionUnreachable> for DispatchError {
    fn from(e: crate::connection::ConnectionUnreachable) -> Self {
        DispatchError::Unreachable(e)
    }
}

/// Handed to a component's handler on every call. Exposes the connection's
/// own identity plus the registry needed to reply and, server-side, to
/// multicast to other connections. A client's dispatcher uses a registry
/// containing only itself, so the same context type serves both sides.
pub struct DispatchContext {
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    remote_addr: Arc<str>,
}

impl DispatchContext {
    pub fn new(connection_id: ConnectionId, registry: Arc<ConnectionRegistry>, remote_addr: Arc<str>) -> Self {
        Self { connection_id, registry, remote_addr }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The raw transport-level remote address for this connection, exactly
    /// as handed to the dispatcher at construction time (a real socket peer
    /// address in production, a synthetic placeholder in tests). This is the
    /// "raw hostname" of §3 before identification hashes it.
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// Replies to the connection that triggered this handler call.
    pub fn reply(
        &self,
        component: ComponentId,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        self.send_to(self.connection_id, component, message_id, body)
    }

    /// Sends a frame to an arbitrary connection (used for unsolicited
    /// server-originated messages to a specific recipient, e.g. a direct
    /// message).
    pub fn send_to(
        &self,
        target: ConnectionId,
        component: ComponentId,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        let frame = Frame::new(component.as_u8(), message_id, body.into_vec());
        self.registry.send_to(target, frame).map_err(DispatchError::from)
    }

    /// Sends the same frame to every id in `targets` except `exclude`.
    /// Recipients should already be a snapshot taken under whatever guard
    /// protects the caller's membership set (SPEC_FULL.md §5).
    pub fn multicast(
        &self,
        targets: impl IntoIterator<Item = ConnectionId>,
        exclude: Option<ConnectionId>,
        component: ComponentId,
        message_id: u16,
        body: TypedBuffer,
    ) {
        let frame = Frame::new(component.as_u8(), message_id, body.into_vec());
        self.registry.multicast(targets, exclude, frame);
    }
}

/// A protocol subsystem identified by a small integer, owning a related
/// family of messages (§4.4). Implementations hold their own interior
/// mutability (typically a `parking_lot::Mutex` around their state) since
/// the dispatcher calls through a shared `Arc<dyn Component>`.
#[async_trait]
pub trait Component: Send + Sync {
    fn component_id(&self) -> ComponentId;

    /// Called once, in registration order, when the transport becomes
    /// active.
    async fn on_connected(&self, ctx: &DispatchContext);

    /// Called once, in registration order, when the transport is torn
    /// down. Must leave no trace of this connection in the component's
    /// state by the time it returns (disconnect purge, SPEC_FULL.md §8).
    async fn on_disconnected(&self, ctx: &DispatchContext);

    /// Handles one decoded frame body addressed to this component.
    /// `Ok(())` covers both successful processing and semantic rejection
    /// (the handler has already written whatever result code applies into
    /// the reply it sent via `ctx`); `Err` is fatal and disconnects.
    async fn handle(
        &self,
        ctx: &DispatchContext,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError>;
}
