//! Per-connection registry of components, routing inbound frames by
//! component id and giving components a way to send frames back out
//! (§4.4).

use std::sync::Arc;

use jchat_protocol::{ComponentId, MAX_COMPONENT_ID};
use jchat_wire::{Frame, FrameDecoder, TypedBuffer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::component::{Component, DispatchContext, DispatchError};
use crate::connection::{ConnectionId, ConnectionRegistry};

const READ_CHUNK_SIZE: usize = 4096;

/// A component of the same id was registered twice.
#[derive(Debug, Clone, Copy)]
pub struct ComponentAlreadyRegistered(pub ComponentId);

impl std::fmt::Display for ComponentAlreadyRegistered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "component {} is already registered", self.0)
    }
}

impl std::error::Error for ComponentAlreadyRegistered {}

/// Drives a single connection: reads bytes off `stream`, reassembles
/// frames, and routes each to the one registered component whose id
/// matches. Generic over the transport so the same dispatcher drives a
/// real TCP socket in production and an in-memory duplex stream in tests.
pub struct Dispatcher<S> {
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    remote_addr: Arc<str>,
    components: Vec<Arc<dyn Component>>,
    stream: S,
}

impl<S> Dispatcher<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        connection_id: ConnectionId,
        registry: Arc<ConnectionRegistry>,
        remote_addr: impl Into<Arc<str>>,
        stream: S,
    ) -> Self {
        Self {
            connection_id,
            registry,
            remote_addr: remote_addr.into(),
            components: Vec::new(),
            stream,
        }
    }

    /// Registers a component. Must be called before [`Self::run`]; fails if
    /// a component with the same id is already present.
    pub fn register_component(
        &mut self,
        component: Arc<dyn Component>,
    ) -> Result<(), ComponentAlreadyRegistered> {
        let id = component.component_id();
        if self.components.iter().any(|c| c.component_id() == id) {
            return Err(ComponentAlreadyRegistered(id));
        }
        self.components.push(component);
        Ok(())
    }

    /// Runs this connection to completion: fires connected hooks, pumps
    /// inbound frames to their components until the stream closes or a
    /// fatal error occurs, then fires disconnected hooks and deregisters
    /// from the shared registry.
    pub async fn run(self) -> Result<(), DispatchError> {
        let Dispatcher { connection_id, registry, remote_addr, components, stream } = self;

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        registry.insert(connection_id, outbound_tx);

        let (mut read_half, mut write_half) = tokio::io::split(stream);

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if write_half.write_all(&frame.encode()).await.is_err() {
                    break;
                }
            }
        });

        let ctx = DispatchContext::new(connection_id, registry.clone(), remote_addr);
        for component in &components {
            component.on_connected(&ctx).await;
        }

        let result = pump(&mut read_half, &components, &ctx).await;

        for component in &components {
            component.on_disconnected(&ctx).await;
        }
        registry.remove(connection_id);
        drop(read_half);
        writer.abort();

        result
    }
}

async fn pump<S>(
    read_half: &mut tokio::io::ReadHalf<S>,
    components: &[Arc<dyn Component>],
    ctx: &DispatchContext,
) -> Result<(), DispatchError>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = read_half.read(&mut buf).await.map_err(DispatchError::Io)?;
        if n == 0 {
            return Ok(());
        }
        decoder.feed(&buf[..n]);

        loop {
            let frame = decoder
                .try_decode_one()
                .map_err(|e| DispatchError::Io(std::io::Error::other(e)))?;
            let Some(frame) = frame else { break };
            dispatch_frame(frame, components, ctx).await?;
        }
    }
}

async fn dispatch_frame(
    frame: Frame,
    components: &[Arc<dyn Component>],
    ctx: &DispatchContext,
) -> Result<(), DispatchError> {
    if frame.component_id >= MAX_COMPONENT_ID {
        return Err(DispatchError::UnknownComponent(frame.component_id));
    }
    let component_id = ComponentId::try_from(frame.component_id)
        .map_err(|_| DispatchError::UnknownComponent(frame.component_id))?;

    let component = components
        .iter()
        .find(|c| c.component_id() == component_id)
        .ok_or(DispatchError::UnknownComponent(frame.component_id))?;

    let body = TypedBuffer::with_bytes(frame.body, jchat_wire::host_is_little_endian());
    component.handle(ctx, frame.message_id, body).await
}
