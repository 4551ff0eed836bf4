//! Protocol version handshake (§4.5). Grounded on
//! `jchat_server/src/components/system_component.cpp`'s `Hello` handler.

use std::sync::Arc;

use async_trait::async_trait;
use jchat_core::{Component, DispatchContext, DispatchError};
use jchat_protocol::{ComponentId, PROTOCOL_VERSION, SystemResult, system_message};
use jchat_wire::TypedBuffer;
use tracing::{debug, warn};

use crate::user_directory::UserDirectory;

pub struct SystemComponentServer {
    users: Arc<dyn UserDirectory>,
}

impl SystemComponentServer {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    fn reply(&self, ctx: &DispatchContext, result: SystemResult) -> Result<(), DispatchError> {
        let flip = jchat_wire::host_is_little_endian();
        let mut body = TypedBuffer::new(flip);
        body.write_u16(result.as_u16());
        ctx.reply(ComponentId::System, system_message::HELLO_COMPLETE, body)
    }
}

#[async_trait]
impl Component for SystemComponentServer {
    fn component_id(&self) -> ComponentId {
        ComponentId::System
    }

    async fn on_connected(&self, _ctx: &DispatchContext) {}

    async fn on_disconnected(&self, _ctx: &DispatchContext) {}

    async fn handle(
        &self,
        ctx: &DispatchContext,
        message_id: u16,
        mut body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        if message_id != system_message::HELLO {
            return Err(DispatchError::UnknownMessage {
                component: ComponentId::System,
                message_id,
            });
        }

        let protocol_version = body.read_string()?;
        if protocol_version != PROTOCOL_VERSION {
            warn!(connection = %ctx.connection_id(), claimed = %protocol_version, "protocol version mismatch");
            self.reply(ctx, SystemResult::InvalidProtocolVersion)?;
            return Ok(());
        }

        if !self.users.mark_enabled(ctx.connection_id()) {
            return Err(DispatchError::UnknownMessage {
                component: ComponentId::System,
                message_id,
            });
        }

        debug!(connection = %ctx.connection_id(), "handshake complete");
        self.reply(ctx, SystemResult::Ok)
    }
}
