//! Protocol version handshake, client side (§4.5). Sends `Hello`
//! automatically on connect; the embedder never calls this directly.

use std::sync::Arc;

use async_trait::async_trait;
use jchat_core::{Component, DispatchContext, DispatchError, Event};
use jchat_protocol::{ComponentId, PROTOCOL_VERSION, SystemResult, system_message};
use jchat_wire::TypedBuffer;
use tracing::{info, warn};

use crate::user_state::LocalUserState;

/// Surfaced once the handshake concludes, one way or the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeComplete {
    pub result: SystemResult,
}

pub struct SystemComponentClient {
    local_user: Arc<LocalUserState>,
    pub on_handshake_complete: Event<HandshakeComplete>,
}

impl SystemComponentClient {
    pub fn new(local_user: Arc<LocalUserState>) -> Self {
        Self { local_user, on_handshake_complete: Event::new() }
    }

    fn new_buffer() -> TypedBuffer {
        TypedBuffer::new(jchat_wire::host_is_little_endian())
    }

    async fn handle_hello_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let raw = body.read_u16()?;
        let result = SystemResult::try_from(raw).map_err(DispatchError::unknown_result_code)?;

        if result == SystemResult::Ok {
            self.local_user.set_enabled(true);
            info!("handshake complete");
        } else {
            warn!(?result, "handshake rejected");
        }

        self.on_handshake_complete.fire(&HandshakeComplete { result });
        Ok(())
    }
}

#[async_trait]
impl Component for SystemComponentClient {
    fn component_id(&self) -> ComponentId {
        ComponentId::System
    }

    async fn on_connected(&self, ctx: &DispatchContext) {
        self.local_user.reset_for_new_connection();

        let mut body = Self::new_buffer();
        body.write_string(PROTOCOL_VERSION);
        if let Err(e) = ctx.reply(ComponentId::System, system_message::HELLO, body) {
            warn!(error = %e, "failed to send Hello");
        }
    }

    async fn on_disconnected(&self, _ctx: &DispatchContext) {
        self.local_user.set_disconnected();
    }

    async fn handle(
        &self,
        _ctx: &DispatchContext,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        if message_id != system_message::HELLO_COMPLETE {
            return Err(DispatchError::UnknownMessage { component: ComponentId::System, message_id });
        }
        self.handle_hello_complete(body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn buf() -> TypedBuffer {
        TypedBuffer::new(jchat_wire::host_is_little_endian())
    }

    #[tokio::test]
    async fn successful_handshake_enables_the_local_user() {
        let local_user = Arc::new(LocalUserState::new());
        let component = SystemComponentClient::new(local_user.clone());

        let mut body = buf();
        body.write_u16(SystemResult::Ok.as_u16());
        component.handle_hello_complete(body).await.unwrap();

        assert!(local_user.snapshot().enabled);
    }

    #[tokio::test]
    async fn rejected_handshake_leaves_the_local_user_disabled() {
        let local_user = Arc::new(LocalUserState::new());
        let component = SystemComponentClient::new(local_user.clone());

        let mut body = buf();
        body.write_u16(SystemResult::InvalidProtocolVersion.as_u16());
        component.handle_hello_complete(body).await.unwrap();

        assert!(!local_user.snapshot().enabled);
    }

    #[tokio::test]
    async fn handshake_completion_fires_exactly_once() {
        let local_user = Arc::new(LocalUserState::new());
        let component = SystemComponentClient::new(local_user);
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        component.on_handshake_complete.subscribe(false, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
            true
        });

        let mut body = buf();
        body.write_u16(SystemResult::Ok.as_u16());
        component.handle_hello_complete(body).await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
