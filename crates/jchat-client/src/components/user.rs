//! Identification and direct messaging, client side (§4.7). Mirrors the
//! local identity and surfaces every `_Complete`/unsolicited event; also
//! the embedder-facing `identify()`/`send_message()` outbound calls.

use std::sync::Arc;

use async_trait::async_trait;
use jchat_core::{Component, DispatchContext, DispatchError, Event};
use jchat_protocol::{ComponentId, UserResult, user_message};
use jchat_wire::TypedBuffer;
use tracing::{debug, info};

use crate::outbound::{NotConnected, OutboundHandle};
use crate::user_state::LocalUserState;

/// Surfaced when our own `Identify` request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyComplete {
    pub result: UserResult,
    pub username: String,
    pub hostname: Option<String>,
}

/// Surfaced when our own `SendMessage` request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageComplete {
    pub result: UserResult,
    pub target_username: String,
    pub message: String,
}

/// Surfaced when another identified user sends us a direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceived {
    pub from_username: String,
    pub from_hostname: String,
    pub message: String,
}

pub struct UserComponentClient {
    local_user: Arc<LocalUserState>,
    outbound: OutboundHandle,
    pub on_identify_complete: Event<IdentifyComplete>,
    pub on_send_message_complete: Event<SendMessageComplete>,
    pub on_message_received: Event<MessageReceived>,
}

impl UserComponentClient {
    pub fn new(local_user: Arc<LocalUserState>) -> Self {
        Self {
            local_user,
            outbound: OutboundHandle::new(),
            on_identify_complete: Event::new(),
            on_send_message_complete: Event::new(),
            on_message_received: Event::new(),
        }
    }

    fn new_buffer() -> TypedBuffer {
        TypedBuffer::new(jchat_wire::host_is_little_endian())
    }

    /// Builds and sends an `Identify` request.
    pub fn identify(&self, username: &str) -> Result<(), NotConnected> {
        let mut body = Self::new_buffer();
        body.write_string(username);
        self.outbound.send(ComponentId::User, user_message::IDENTIFY, body)
    }

    /// Builds and sends a `SendMessage` (direct message) request.
    pub fn send_message(&self, target_username: &str, message: &str) -> Result<(), NotConnected> {
        let mut body = Self::new_buffer();
        body.write_string(target_username);
        body.write_string(message);
        self.outbound.send(ComponentId::User, user_message::SEND_MESSAGE, body)
    }

    pub fn local_identity(&self) -> crate::user_state::LocalUser {
        self.local_user.snapshot()
    }

    async fn handle_identify_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let raw = body.read_u16()?;
        let result = UserResult::try_from(raw).map_err(DispatchError::unknown_result_code)?;
        let username = body.read_string()?;
        let hostname = if result == UserResult::Ok { Some(body.read_string()?) } else { None };

        if result == UserResult::Ok {
            self.local_user.set_identified(username.clone(), hostname.clone().unwrap_or_default());
            info!(username = %username, "identified");
        } else {
            debug!(?result, "identify rejected");
        }

        self.on_identify_complete.fire(&IdentifyComplete { result, username, hostname });
        Ok(())
    }

    async fn handle_send_message_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let raw = body.read_u16()?;
        let result = UserResult::try_from(raw).map_err(DispatchError::unknown_result_code)?;
        let target_username = body.read_string()?;
        let message = body.read_string()?;

        self.on_send_message_complete.fire(&SendMessageComplete { result, target_username, message });
        Ok(())
    }

    async fn handle_unsolicited_send_message(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let raw = body.read_u16()?;
        let _result = UserResult::try_from(raw).map_err(DispatchError::unknown_result_code)?;
        let from_username = body.read_string()?;
        let from_hostname = body.read_string()?;
        let message = body.read_string()?;

        self.on_message_received.fire(&MessageReceived { from_username, from_hostname, message });
        Ok(())
    }
}

#[async_trait]
impl Component for UserComponentClient {
    fn component_id(&self) -> ComponentId {
        ComponentId::User
    }

    async fn on_connected(&self, ctx: &DispatchContext) {
        self.outbound.set(ctx.connection_id(), ctx.registry().clone());
    }

    async fn on_disconnected(&self, _ctx: &DispatchContext) {
        self.outbound.clear();
    }

    async fn handle(
        &self,
        _ctx: &DispatchContext,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        match message_id {
            user_message::IDENTIFY_COMPLETE => self.handle_identify_complete(body).await,
            user_message::SEND_MESSAGE_COMPLETE => self.handle_send_message_complete(body).await,
            user_message::SEND_MESSAGE => self.handle_unsolicited_send_message(body).await,
            other => Err(DispatchError::UnknownMessage { component: ComponentId::User, message_id: other }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> UserComponentClient {
        UserComponentClient::new(Arc::new(LocalUserState::new()))
    }

    fn buf() -> TypedBuffer {
        TypedBuffer::new(jchat_wire::host_is_little_endian())
    }

    #[tokio::test]
    async fn successful_identify_updates_local_identity() {
        let client = client();
        let mut body = buf();
        body.write_u16(UserResult::Ok.as_u16());
        body.write_string("alice");
        body.write_string("deadbeef");

        client.handle_identify_complete(body).await.unwrap();

        let identity = client.local_identity();
        assert!(identity.identified);
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.hostname, "deadbeef");
    }

    #[tokio::test]
    async fn rejected_identify_leaves_local_identity_unset() {
        let client = client();
        let mut body = buf();
        body.write_u16(UserResult::UsernameInUse.as_u16());
        body.write_string("alice");

        client.handle_identify_complete(body).await.unwrap();

        assert!(!client.local_identity().identified);
    }

    #[tokio::test]
    async fn unsolicited_message_fires_message_received() {
        let client = client();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        client.on_message_received.subscribe(false, move |event| {
            *seen2.lock().unwrap() = Some(event.clone());
            true
        });

        let mut body = buf();
        body.write_u16(UserResult::Ok.as_u16());
        body.write_string("bob");
        body.write_string("cafebabe");
        body.write_string("hi there");

        client.handle_unsolicited_send_message(body).await.unwrap();

        let event = seen.lock().unwrap().clone().unwrap();
        assert_eq!(event.from_username, "bob");
        assert_eq!(event.message, "hi there");
    }

    #[tokio::test]
    async fn unknown_result_code_is_fatal() {
        let client = client();
        let mut body = buf();
        body.write_u16(0xffff);
        body.write_string("alice");

        let result = client.handle_identify_complete(body).await;
        assert!(matches!(result, Err(DispatchError::UnknownResultCode(_))));
    }
}
