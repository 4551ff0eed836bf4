//! Channel membership, operators, and bans (§4.8). Grounded on
//! `jchat_server/src/components/channel_component.cpp`; `OpUser`,
//! `DeopUser`, and `UnbanUser` were left as `// TODO: Implement` stubs in
//! that source and are implemented here per the resolved semantics of
//! SPEC_FULL.md §4.8/§9.

use std::sync::Arc;

use async_trait::async_trait;
use jchat_core::{Component, ConnectionId, DispatchContext, DispatchError};
use jchat_protocol::{ChannelResult, ComponentId, MESSAGE_MAX_LEN, channel_message, is_valid_channel_name};
use jchat_wire::TypedBuffer;
use tracing::trace;

use crate::channel_state::{Channel, ChannelRegistry};
use crate::user_directory::{UserDirectory, UserIdentity};

pub struct ChannelComponentServer {
    channels: ChannelRegistry,
    users: Arc<dyn UserDirectory>,
}

impl ChannelComponentServer {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { channels: ChannelRegistry::new(), users }
    }

    fn new_buffer() -> TypedBuffer {
        TypedBuffer::new(jchat_wire::host_is_little_endian())
    }

    fn identity(&self, connection_id: ConnectionId) -> Option<UserIdentity> {
        self.users.identity_of(connection_id)
    }

    fn ban_token(identity: &UserIdentity) -> String {
        format!("{}@{}", identity.username, identity.hostname)
    }

    fn find_member_by_username(&self, channel: &Channel, username: &str) -> Option<(ConnectionId, UserIdentity)> {
        channel.all_members().into_iter().find_map(|id| {
            let identity = self.identity(id)?;
            (identity.username == username).then_some((id, identity))
        })
    }

    fn multicast_unsolicited(
        &self,
        ctx: &DispatchContext,
        targets: Vec<ConnectionId>,
        exclude: Option<ConnectionId>,
        message_id: u16,
        body: TypedBuffer,
    ) {
        ctx.multicast(targets, exclude, ComponentId::Channel, message_id, body);
    }

    /// Requester must be identified; returns their identity or replies
    /// `NotIdentified` and returns `None`.
    fn require_identified(
        &self,
        ctx: &DispatchContext,
        complete_message_id: u16,
        channel_name: &str,
    ) -> Result<Option<UserIdentity>, DispatchError> {
        match self.identity(ctx.connection_id()) {
            Some(identity) if identity.identified => Ok(Some(identity)),
            _ => {
                let mut body = Self::new_buffer();
                body.write_u16(ChannelResult::NotIdentified.as_u16());
                body.write_string(channel_name);
                ctx.reply(ComponentId::Channel, complete_message_id, body)?;
                Ok(None)
            }
        }
    }

    /// Validates the channel name shape; replies with the matching
    /// rejection and returns `false` if invalid.
    fn require_valid_channel_name(
        &self,
        ctx: &DispatchContext,
        complete_message_id: u16,
        channel_name: &str,
    ) -> Result<bool, DispatchError> {
        if is_valid_channel_name(channel_name) {
            return Ok(true);
        }
        let result = if channel_name.starts_with('#') {
            ChannelResult::ChannelNameTooLong
        } else {
            ChannelResult::InvalidChannelName
        };
        let mut body = Self::new_buffer();
        body.write_u16(result.as_u16());
        body.write_string(channel_name);
        ctx.reply(ComponentId::Channel, complete_message_id, body)?;
        Ok(false)
    }

    async fn handle_join(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let complete = channel_message::JOIN_CHANNEL_COMPLETE;

        let Some(identity) = self.require_identified(ctx, complete, &name)? else { return Ok(()) };
        if !self.require_valid_channel_name(ctx, complete, &name)? {
            return Ok(());
        }

        let Some(channel) = self.channels.find(&name) else {
            let channel = self.channels.create(name.clone(), ctx.connection_id());
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::ChannelCreated.as_u16());
            reply.write_string(&name);
            ctx.reply(ComponentId::Channel, complete, reply)?;
            trace!(channel = %channel.name, "channel created");
            return Ok(());
        };

        if channel.is_member(ctx.connection_id()) {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::AlreadyInChannel.as_u16());
            reply.write_string(&name);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        let ban_token = Self::ban_token(&identity);
        if channel.is_banned(&ban_token) {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::BannedFromChannel.as_u16());
            reply.write_string(&name);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        channel.add_member(ctx.connection_id());

        let others = channel.other_members(ctx.connection_id());
        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        reply.write_u32(others.len() as u32);
        for other_id in &others {
            if let Some(other_identity) = self.identity(*other_id) {
                reply.write_string(&other_identity.username);
                reply.write_string(&other_identity.hostname);
                reply.write_bool(channel.is_operator(*other_id));
            }
        }
        let bans = channel.ban_tokens();
        reply.write_u32(bans.len() as u32);
        for token in &bans {
            reply.write_string(token);
        }
        ctx.reply(ComponentId::Channel, complete, reply)?;

        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserJoined.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&identity.username);
        unsolicited.write_string(&identity.hostname);
        self.multicast_unsolicited(ctx, others, None, channel_message::JOIN_CHANNEL, unsolicited);

        Ok(())
    }

    async fn handle_leave(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let complete = channel_message::LEAVE_CHANNEL_COMPLETE;

        let Some(identity) = self.require_identified(ctx, complete, &name)? else { return Ok(()) };
        if !self.require_valid_channel_name(ctx, complete, &name)? {
            return Ok(());
        }

        let channel = self.channels.find(&name);
        let is_member = channel.as_ref().is_some_and(|c| c.is_member(ctx.connection_id()));
        if !is_member {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::NotInChannel.as_u16());
            reply.write_string(&name);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }
        let channel = channel.expect("checked above");

        let others = channel.other_members(ctx.connection_id());
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserLeft.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&identity.username);
        unsolicited.write_string(&identity.hostname);
        self.multicast_unsolicited(ctx, others, None, channel_message::LEAVE_CHANNEL, unsolicited);

        channel.remove_member(ctx.connection_id());
        self.channels.remove_if_empty(&name);

        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        ctx.reply(ComponentId::Channel, complete, reply)
    }

    async fn handle_send_message(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let text = body.read_string()?;
        let complete = channel_message::SEND_MESSAGE_COMPLETE;

        let reply_with = |result: ChannelResult| -> Result<(), DispatchError> {
            let mut reply = Self::new_buffer();
            reply.write_u16(result.as_u16());
            reply.write_string(&name);
            reply.write_string(&text);
            ctx.reply(ComponentId::Channel, complete, reply)
        };

        let Some(identity) = self.identity(ctx.connection_id()).filter(|i| i.identified) else {
            return reply_with(ChannelResult::NotIdentified);
        };
        if !is_valid_channel_name(&name) {
            return reply_with(ChannelResult::InvalidChannelName);
        }

        let Some(channel) = self.channels.find(&name).filter(|c| c.is_member(ctx.connection_id())) else {
            return reply_with(ChannelResult::NotInChannel);
        };

        if text.is_empty() {
            return reply_with(ChannelResult::InvalidMessage);
        }
        if text.len() > MESSAGE_MAX_LEN {
            return reply_with(ChannelResult::MessageTooLong);
        }

        let others = channel.other_members(ctx.connection_id());
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::MessageSent.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&identity.username);
        unsolicited.write_string(&identity.hostname);
        unsolicited.write_string(&text);
        self.multicast_unsolicited(ctx, others, None, channel_message::SEND_MESSAGE, unsolicited);

        reply_with(ChannelResult::Ok)
    }

    /// Shared membership/name/permission prelude for Kick/Ban/Op/Deop/Unban:
    /// identified, valid channel name, requester is a member, requester is
    /// an operator. Returns the channel and requester identity on success.
    async fn require_operator(
        &self,
        ctx: &DispatchContext,
        complete: u16,
        name: &str,
        target: &str,
    ) -> Result<Option<(Arc<Channel>, UserIdentity)>, DispatchError> {
        let reply_with = |result: ChannelResult| -> Result<(), DispatchError> {
            let mut reply = Self::new_buffer();
            reply.write_u16(result.as_u16());
            reply.write_string(name);
            reply.write_string(target);
            ctx.reply(ComponentId::Channel, complete, reply)
        };

        let Some(identity) = self.identity(ctx.connection_id()).filter(|i| i.identified) else {
            reply_with(ChannelResult::NotIdentified)?;
            return Ok(None);
        };
        if !is_valid_channel_name(name) {
            reply_with(ChannelResult::InvalidChannelName)?;
            return Ok(None);
        }
        let Some(channel) = self.channels.find(name) else {
            reply_with(ChannelResult::NotInChannel)?;
            return Ok(None);
        };
        if !channel.is_member(ctx.connection_id()) {
            reply_with(ChannelResult::NotInChannel)?;
            return Ok(None);
        }
        if !channel.is_operator(ctx.connection_id()) {
            reply_with(ChannelResult::NotPermitted)?;
            return Ok(None);
        }
        Ok(Some((channel, identity)))
    }

    async fn handle_kick(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let target = body.read_string()?;
        let complete = channel_message::KICK_USER_COMPLETE;

        let Some((channel, requester)) = self.require_operator(ctx, complete, &name, &target).await? else {
            return Ok(());
        };

        if target == requester.username {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::CannotKickSelf.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        let Some((target_id, target_identity)) = self.find_member_by_username(&channel, &target) else {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::InvalidUsername.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        };

        let remaining = channel.other_members(ctx.connection_id());
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserKicked.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&target_identity.username);
        unsolicited.write_string(&target_identity.hostname);
        self.multicast_unsolicited(ctx, remaining, Some(target_id), channel_message::KICK_USER, unsolicited);

        channel.remove_member(target_id);
        self.channels.remove_if_empty(&name);

        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        reply.write_string(&target);
        reply.write_string(&target_identity.username);
        reply.write_string(&target_identity.hostname);
        ctx.reply(ComponentId::Channel, complete, reply)
    }

    async fn handle_ban(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let target = body.read_string()?;
        let complete = channel_message::BAN_USER_COMPLETE;

        let Some((channel, requester)) = self.require_operator(ctx, complete, &name, &target).await? else {
            return Ok(());
        };

        if target == requester.username {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::CannotBanSelf.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        let Some((target_id, target_identity)) = self.find_member_by_username(&channel, &target) else {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::InvalidUsername.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        };

        let token = Self::ban_token(&target_identity);
        if channel.is_banned(&token) {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::AlreadyBanned.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }
        channel.add_ban(token);

        let remaining = channel.other_members(ctx.connection_id());
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserBanned.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&target_identity.username);
        unsolicited.write_string(&target_identity.hostname);
        self.multicast_unsolicited(ctx, remaining, Some(target_id), channel_message::BAN_USER, unsolicited);

        channel.remove_member(target_id);
        self.channels.remove_if_empty(&name);

        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        reply.write_string(&target);
        reply.write_string(&target_identity.username);
        reply.write_string(&target_identity.hostname);
        ctx.reply(ComponentId::Channel, complete, reply)
    }

    async fn handle_op(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let target = body.read_string()?;
        let complete = channel_message::OP_USER_COMPLETE;

        let Some((channel, requester)) = self.require_operator(ctx, complete, &name, &target).await? else {
            return Ok(());
        };

        let Some((target_id, target_identity)) = self.find_member_by_username(&channel, &target) else {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::InvalidUsername.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        };

        if target == requester.username {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::CannotOpSelf.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        if channel.is_operator(target_id) {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::AlreadyOperator.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        channel.add_operator(target_id);

        let all = channel.all_members();
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserOpped.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&target_identity.username);
        unsolicited.write_string(&target_identity.hostname);
        self.multicast_unsolicited(ctx, all, None, channel_message::OP_USER, unsolicited);

        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        reply.write_string(&target);
        ctx.reply(ComponentId::Channel, complete, reply)
    }

    async fn handle_deop(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let target = body.read_string()?;
        let complete = channel_message::DEOP_USER_COMPLETE;

        let Some((channel, _requester)) = self.require_operator(ctx, complete, &name, &target).await? else {
            return Ok(());
        };

        let Some((target_id, target_identity)) = self.find_member_by_username(&channel, &target) else {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::InvalidUsername.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        };

        if !channel.is_operator(target_id) {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::AlreadyNotOperator.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        }

        channel.remove_operator(target_id);

        let all = channel.all_members();
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserDeopped.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&target_identity.username);
        unsolicited.write_string(&target_identity.hostname);
        self.multicast_unsolicited(ctx, all, None, channel_message::DEOP_USER, unsolicited);

        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        reply.write_string(&target);
        ctx.reply(ComponentId::Channel, complete, reply)
    }

    async fn handle_unban(&self, ctx: &DispatchContext, mut body: TypedBuffer) -> Result<(), DispatchError> {
        let name = body.read_string()?;
        let target = body.read_string()?;
        let complete = channel_message::UNBAN_USER_COMPLETE;

        let Some((channel, _requester)) = self.require_operator(ctx, complete, &name, &target).await? else {
            return Ok(());
        };

        let Some(removed_token) = channel.remove_ban_by_username(&target) else {
            let mut reply = Self::new_buffer();
            reply.write_u16(ChannelResult::NotBanned.as_u16());
            reply.write_string(&name);
            reply.write_string(&target);
            return ctx.reply(ComponentId::Channel, complete, reply);
        };
        let matched_hostname = removed_token.split_once('@').map(|(_, host)| host.to_string()).unwrap_or_default();

        let all = channel.all_members();
        let mut unsolicited = Self::new_buffer();
        unsolicited.write_u16(ChannelResult::UserUnbanned.as_u16());
        unsolicited.write_string(&name);
        unsolicited.write_string(&target);
        unsolicited.write_string(&matched_hostname);
        self.multicast_unsolicited(ctx, all, None, channel_message::UNBAN_USER, unsolicited);

        let mut reply = Self::new_buffer();
        reply.write_u16(ChannelResult::Ok.as_u16());
        reply.write_string(&name);
        reply.write_string(&target);
        ctx.reply(ComponentId::Channel, complete, reply)
    }
}

#[async_trait]
impl Component for ChannelComponentServer {
    fn component_id(&self) -> ComponentId {
        ComponentId::Channel
    }

    async fn on_connected(&self, _ctx: &DispatchContext) {}

    /// Disconnect purge (§8 property 5): leave every channel the session
    /// belonged to, notifying remaining members, then drop empty channels.
    async fn on_disconnected(&self, ctx: &DispatchContext) {
        let connection_id = ctx.connection_id();
        let identity = self.identity(connection_id);
        for channel in self.channels.channels_containing(connection_id) {
            let others = channel.other_members(connection_id);
            if let Some(identity) = &identity {
                let mut unsolicited = Self::new_buffer();
                unsolicited.write_u16(ChannelResult::UserLeft.as_u16());
                unsolicited.write_string(&channel.name);
                unsolicited.write_string(&identity.username);
                unsolicited.write_string(&identity.hostname);
                self.multicast_unsolicited(ctx, others, None, channel_message::LEAVE_CHANNEL, unsolicited);
            }
            channel.remove_member(connection_id);
            self.channels.remove_if_empty(&channel.name);
        }
    }

    async fn handle(
        &self,
        ctx: &DispatchContext,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        match message_id {
            channel_message::JOIN_CHANNEL => self.handle_join(ctx, body).await,
            channel_message::LEAVE_CHANNEL => self.handle_leave(ctx, body).await,
            channel_message::SEND_MESSAGE => self.handle_send_message(ctx, body).await,
            channel_message::KICK_USER => self.handle_kick(ctx, body).await,
            channel_message::BAN_USER => self.handle_ban(ctx, body).await,
            channel_message::OP_USER => self.handle_op(ctx, body).await,
            channel_message::DEOP_USER => self.handle_deop(ctx, body).await,
            channel_message::UNBAN_USER => self.handle_unban(ctx, body).await,
            other => Err(DispatchError::UnknownMessage { component: ComponentId::Channel, message_id: other }),
        }
    }
}
