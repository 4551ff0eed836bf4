//! Channel membership, operators, and bans, client side (§4.9). Mirrors
//! every server-driven state change into [`crate::channel_state::ChannelMirror`]
//! and surfaces it as a [`ChannelEvent`]; also the embedder-facing
//! `join_channel()`/`leave_channel()`/... outbound calls.

use async_trait::async_trait;
use jchat_core::{Component, DispatchContext, DispatchError, Event};
use jchat_protocol::{ChannelResult, ComponentId, channel_message};
use jchat_wire::TypedBuffer;
use tracing::debug;

use crate::channel_state::{ChannelMember, ChannelMirror};
use crate::outbound::{NotConnected, OutboundHandle};
use crate::user_state::LocalUserState;

/// Every distinct shape a Channel-component frame can take, `_Complete`
/// acks to our own requests and unsolicited state changes alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    JoinComplete { name: String, result: ChannelResult },
    UserJoined { name: String, username: String, hostname: String },
    LeaveComplete { name: String, result: ChannelResult },
    UserLeft { name: String, username: String, hostname: String },
    SendComplete { name: String, result: ChannelResult, text: String },
    MessageReceived { name: String, username: String, hostname: String, text: String },
    KickComplete { name: String, result: ChannelResult, target: String },
    UserKicked { name: String, username: String, hostname: String },
    BanComplete { name: String, result: ChannelResult, target: String },
    UserBanned { name: String, username: String, hostname: String },
    OpComplete { name: String, result: ChannelResult, target: String },
    UserOpped { name: String, username: String, hostname: String },
    DeopComplete { name: String, result: ChannelResult, target: String },
    UserDeopped { name: String, username: String, hostname: String },
    UnbanComplete { name: String, result: ChannelResult, target: String },
    UserUnbanned { name: String, username: String },
}

pub struct ChannelComponentClient {
    local_user: std::sync::Arc<LocalUserState>,
    mirror: ChannelMirror,
    outbound: OutboundHandle,
    pub on_event: Event<ChannelEvent>,
}

impl ChannelComponentClient {
    pub fn new(local_user: std::sync::Arc<LocalUserState>) -> Self {
        Self {
            local_user,
            mirror: ChannelMirror::new(),
            outbound: OutboundHandle::new(),
            on_event: Event::new(),
        }
    }

    pub fn mirror(&self) -> &ChannelMirror {
        &self.mirror
    }

    fn new_buffer() -> TypedBuffer {
        TypedBuffer::new(jchat_wire::host_is_little_endian())
    }

    fn read_result(body: &mut TypedBuffer) -> Result<ChannelResult, DispatchError> {
        let raw = body.read_u16()?;
        ChannelResult::try_from(raw).map_err(DispatchError::unknown_result_code)
    }

    pub fn join_channel(&self, name: &str) -> Result<(), NotConnected> {
        let mut body = Self::new_buffer();
        body.write_string(name);
        self.outbound.send(ComponentId::Channel, channel_message::JOIN_CHANNEL, body)
    }

    pub fn leave_channel(&self, name: &str) -> Result<(), NotConnected> {
        let mut body = Self::new_buffer();
        body.write_string(name);
        self.outbound.send(ComponentId::Channel, channel_message::LEAVE_CHANNEL, body)
    }

    pub fn send_message(&self, name: &str, text: &str) -> Result<(), NotConnected> {
        let mut body = Self::new_buffer();
        body.write_string(name);
        body.write_string(text);
        self.outbound.send(ComponentId::Channel, channel_message::SEND_MESSAGE, body)
    }

    pub fn kick_user(&self, name: &str, target_username: &str) -> Result<(), NotConnected> {
        self.send_name_target(channel_message::KICK_USER, name, target_username)
    }

    pub fn ban_user(&self, name: &str, target_username: &str) -> Result<(), NotConnected> {
        self.send_name_target(channel_message::BAN_USER, name, target_username)
    }

    pub fn op_user(&self, name: &str, target_username: &str) -> Result<(), NotConnected> {
        self.send_name_target(channel_message::OP_USER, name, target_username)
    }

    pub fn deop_user(&self, name: &str, target_username: &str) -> Result<(), NotConnected> {
        self.send_name_target(channel_message::DEOP_USER, name, target_username)
    }

    pub fn unban_user(&self, name: &str, target_username: &str) -> Result<(), NotConnected> {
        self.send_name_target(channel_message::UNBAN_USER, name, target_username)
    }

    fn send_name_target(&self, message_id: u16, name: &str, target_username: &str) -> Result<(), NotConnected> {
        let mut body = Self::new_buffer();
        body.write_string(name);
        body.write_string(target_username);
        self.outbound.send(ComponentId::Channel, message_id, body)
    }

    async fn handle_join_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;

        let local = self.local_user.snapshot();
        match result {
            ChannelResult::ChannelCreated => {
                self.mirror.insert_created(&name, &local.username, &local.hostname);
            }
            ChannelResult::Ok => {
                let other_count = body.read_u32()? as usize;
                let mut others = Vec::with_capacity(other_count);
                for _ in 0..other_count {
                    let username = body.read_string()?;
                    let hostname = body.read_string()?;
                    let is_operator = body.read_bool()?;
                    others.push(ChannelMember { username, hostname, is_operator });
                }
                let ban_count = body.read_u32()? as usize;
                let mut bans = Vec::with_capacity(ban_count);
                for _ in 0..ban_count {
                    bans.push(body.read_string()?);
                }
                self.mirror.insert_joined(&name, &local.username, &local.hostname, others, bans);
            }
            _ => {}
        }

        self.on_event.fire(&ChannelEvent::JoinComplete { name, result });
        Ok(())
    }

    async fn handle_user_joined(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;

        self.mirror.add_remote_member(&name, &username, &hostname);
        self.on_event.fire(&ChannelEvent::UserJoined { name, username, hostname });
        Ok(())
    }

    async fn handle_leave_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;

        if result == ChannelResult::Ok {
            self.mirror.remove(&name);
        }
        self.on_event.fire(&ChannelEvent::LeaveComplete { name, result });
        Ok(())
    }

    async fn handle_user_left(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;

        self.mirror.remove_remote_member(&name, &username);
        self.on_event.fire(&ChannelEvent::UserLeft { name, username, hostname });
        Ok(())
    }

    async fn handle_send_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let text = body.read_string()?;

        self.on_event.fire(&ChannelEvent::SendComplete { name, result, text });
        Ok(())
    }

    async fn handle_message_received(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;
        let text = body.read_string()?;

        self.on_event.fire(&ChannelEvent::MessageReceived { name, username, hostname, text });
        Ok(())
    }

    async fn handle_kick_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let target = body.read_string()?;
        if result == ChannelResult::Ok {
            let target_username = body.read_string()?;
            let _target_hostname = body.read_string()?;
            self.mirror.remove_remote_member(&name, &target_username);
        }
        self.on_event.fire(&ChannelEvent::KickComplete { name, result, target });
        Ok(())
    }

    async fn handle_user_kicked(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;

        self.mirror.remove_remote_member(&name, &username);
        self.on_event.fire(&ChannelEvent::UserKicked { name, username, hostname });
        Ok(())
    }

    async fn handle_ban_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let target = body.read_string()?;
        if result == ChannelResult::Ok {
            let target_username = body.read_string()?;
            let target_hostname = body.read_string()?;
            self.mirror.add_ban(&name, &target_username, &target_hostname);
            self.mirror.remove_remote_member(&name, &target_username);
        }
        self.on_event.fire(&ChannelEvent::BanComplete { name, result, target });
        Ok(())
    }

    async fn handle_user_banned(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;

        self.mirror.add_ban(&name, &username, &hostname);
        self.mirror.remove_remote_member(&name, &username);
        self.on_event.fire(&ChannelEvent::UserBanned { name, username, hostname });
        Ok(())
    }

    async fn handle_op_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let target = body.read_string()?;
        if result == ChannelResult::Ok {
            self.mirror.set_operator(&name, &target, true);
        }
        self.on_event.fire(&ChannelEvent::OpComplete { name, result, target });
        Ok(())
    }

    async fn handle_user_opped(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;

        self.mirror.set_operator(&name, &username, true);
        self.on_event.fire(&ChannelEvent::UserOpped { name, username, hostname });
        Ok(())
    }

    async fn handle_deop_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let target = body.read_string()?;
        if result == ChannelResult::Ok {
            self.mirror.set_operator(&name, &target, false);
        }
        self.on_event.fire(&ChannelEvent::DeopComplete { name, result, target });
        Ok(())
    }

    async fn handle_user_deopped(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let hostname = body.read_string()?;

        self.mirror.set_operator(&name, &username, false);
        self.on_event.fire(&ChannelEvent::UserDeopped { name, username, hostname });
        Ok(())
    }

    async fn handle_unban_complete(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let target = body.read_string()?;
        if result == ChannelResult::Ok {
            self.mirror.remove_ban(&name, &target);
        }
        self.on_event.fire(&ChannelEvent::UnbanComplete { name, result, target });
        Ok(())
    }

    async fn handle_user_unbanned(&self, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let _result = Self::read_result(&mut body)?;
        let name = body.read_string()?;
        let username = body.read_string()?;
        let _hostname = body.read_string()?;

        self.mirror.remove_ban(&name, &username);
        self.on_event.fire(&ChannelEvent::UserUnbanned { name, username });
        Ok(())
    }
}

#[async_trait]
impl Component for ChannelComponentClient {
    fn component_id(&self) -> ComponentId {
        ComponentId::Channel
    }

    async fn on_connected(&self, ctx: &DispatchContext) {
        self.outbound.set(ctx.connection_id(), ctx.registry().clone());
    }

    async fn on_disconnected(&self, _ctx: &DispatchContext) {
        self.outbound.clear();
        self.mirror.clear();
        debug!("channel mirror cleared on disconnect");
    }

    async fn handle(
        &self,
        _ctx: &DispatchContext,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        match message_id {
            channel_message::JOIN_CHANNEL_COMPLETE => self.handle_join_complete(body).await,
            channel_message::JOIN_CHANNEL => self.handle_user_joined(body).await,
            channel_message::LEAVE_CHANNEL_COMPLETE => self.handle_leave_complete(body).await,
            channel_message::LEAVE_CHANNEL => self.handle_user_left(body).await,
            channel_message::SEND_MESSAGE_COMPLETE => self.handle_send_complete(body).await,
            channel_message::SEND_MESSAGE => self.handle_message_received(body).await,
            channel_message::KICK_USER_COMPLETE => self.handle_kick_complete(body).await,
            channel_message::KICK_USER => self.handle_user_kicked(body).await,
            channel_message::BAN_USER_COMPLETE => self.handle_ban_complete(body).await,
            channel_message::BAN_USER => self.handle_user_banned(body).await,
            channel_message::OP_USER_COMPLETE => self.handle_op_complete(body).await,
            channel_message::OP_USER => self.handle_user_opped(body).await,
            channel_message::DEOP_USER_COMPLETE => self.handle_deop_complete(body).await,
            channel_message::DEOP_USER => self.handle_user_deopped(body).await,
            channel_message::UNBAN_USER_COMPLETE => self.handle_unban_complete(body).await,
            channel_message::UNBAN_USER => self.handle_user_unbanned(body).await,
            other => Err(DispatchError::UnknownMessage { component: ComponentId::Channel, message_id: other }),
        }
    }
}
