//! Identification and direct messaging (§4.6). Grounded on
//! `jchat_server/src/components/user_component.cpp`.

use std::sync::Arc;

use async_trait::async_trait;
use jchat_core::{Component, DispatchContext, DispatchError, hash_hostname};
use jchat_protocol::{ComponentId, MESSAGE_MAX_LEN, UserResult, is_valid_username, user_message};
use jchat_wire::TypedBuffer;
use rand::Rng;
use tracing::{debug, info};

use crate::user_directory::{UserDirectory, UserIdentity};
use crate::user_state::UserRegistry;

pub struct UserComponentServer {
    users: Arc<UserRegistry>,
}

impl UserComponentServer {
    pub fn new(users: Arc<UserRegistry>) -> Self {
        Self { users }
    }

    fn reply_identify(
        &self,
        ctx: &DispatchContext,
        result: UserResult,
        username: &str,
        hashed_hostname: Option<&str>,
    ) -> Result<(), DispatchError> {
        let mut body = TypedBuffer::new(jchat_wire::host_is_little_endian());
        body.write_u16(result.as_u16());
        body.write_string(username);
        if let Some(hostname) = hashed_hostname {
            body.write_string(hostname);
        }
        ctx.reply(ComponentId::User, user_message::IDENTIFY_COMPLETE, body)
    }

    fn reply_send_message(
        &self,
        ctx: &DispatchContext,
        result: UserResult,
        target_username: &str,
        message: &str,
    ) -> Result<(), DispatchError> {
        let mut body = TypedBuffer::new(jchat_wire::host_is_little_endian());
        body.write_u16(result.as_u16());
        body.write_string(target_username);
        body.write_string(message);
        ctx.reply(ComponentId::User, user_message::SEND_MESSAGE_COMPLETE, body)
    }

    async fn handle_identify(
        &self,
        ctx: &DispatchContext,
        mut body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        let username = body.read_string()?;

        if !is_valid_username(&username) {
            let result = if username.is_empty() || username.contains('#') {
                UserResult::InvalidUsername
            } else {
                UserResult::UsernameTooLong
            };
            return self.reply_identify(ctx, result, &username, None);
        }

        let record = self.users.get(ctx.connection_id());
        let Some(record) = record else {
            return Err(DispatchError::UnknownMessage {
                component: ComponentId::User,
                message_id: user_message::IDENTIFY,
            });
        };

        if record.identified {
            return self.reply_identify(ctx, UserResult::AlreadyIdentified, &username, None);
        }

        if self.users.username_taken(&username) {
            return self.reply_identify(ctx, UserResult::UsernameInUse, &username, None);
        }

        let hashed_hostname = hash_hostname(&record.hostname);
        self.users.identify(ctx.connection_id(), username.clone(), hashed_hostname.clone());
        info!(connection = %ctx.connection_id(), username = %username, "identified");

        self.reply_identify(ctx, UserResult::Ok, &username, Some(&hashed_hostname))
    }

    async fn handle_send_message(
        &self,
        ctx: &DispatchContext,
        mut body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        let target_username = body.read_string()?;
        let message = body.read_string()?;

        let Some(sender) = self.users.get(ctx.connection_id()) else {
            return Err(DispatchError::UnknownMessage {
                component: ComponentId::User,
                message_id: user_message::SEND_MESSAGE,
            });
        };

        if !sender.identified {
            return self.reply_send_message(ctx, UserResult::NotIdentified, &target_username, &message);
        }

        if target_username == sender.username {
            return self.reply_send_message(ctx, UserResult::CannotMessageSelf, &target_username, &message);
        }

        if target_username.is_empty() || target_username.contains('#') {
            return self.reply_send_message(ctx, UserResult::InvalidUsername, &target_username, &message);
        }

        let Some((target_id, target)) = self.users.find_by_username(&target_username) else {
            return self.reply_send_message(ctx, UserResult::InvalidUsername, &target_username, &message);
        };

        if !target.identified {
            return self.reply_send_message(ctx, UserResult::UserNotIdentified, &target_username, &message);
        }

        if message.is_empty() {
            return self.reply_send_message(ctx, UserResult::InvalidMessage, &target_username, &message);
        }

        if message.len() > MESSAGE_MAX_LEN {
            return self.reply_send_message(ctx, UserResult::MessageTooLong, &target_username, &message);
        }

        let mut unsolicited = TypedBuffer::new(jchat_wire::host_is_little_endian());
        unsolicited.write_u16(UserResult::MessageSent.as_u16());
        unsolicited.write_string(&sender.username);
        unsolicited.write_string(&sender.hostname);
        unsolicited.write_string(&message);
        ctx.send_to(target_id, ComponentId::User, user_message::SEND_MESSAGE, unsolicited)?;

        self.reply_send_message(ctx, UserResult::Ok, &target_username, &message)
    }
}

#[async_trait]
impl Component for UserComponentServer {
    fn component_id(&self) -> ComponentId {
        ComponentId::User
    }

    async fn on_connected(&self, ctx: &DispatchContext) {
        let guest_username = format!("guest-{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.users.insert(ctx.connection_id(), guest_username, ctx.remote_addr().to_string());
        debug!(connection = %ctx.connection_id(), "user record created");
    }

    async fn on_disconnected(&self, ctx: &DispatchContext) {
        self.users.remove(ctx.connection_id());
        debug!(connection = %ctx.connection_id(), "user record purged");
    }

    async fn handle(
        &self,
        ctx: &DispatchContext,
        message_id: u16,
        body: TypedBuffer,
    ) -> Result<(), DispatchError> {
        match message_id {
            user_message::IDENTIFY => self.handle_identify(ctx, body).await,
            user_message::SEND_MESSAGE => self.handle_send_message(ctx, body).await,
            other => Err(DispatchError::UnknownMessage { component: ComponentId::User, message_id: other }),
        }
    }
}

impl UserDirectory for UserComponentServer {
    fn identity_of(&self, connection_id: jchat_core::ConnectionId) -> Option<UserIdentity> {
        self.users.get(connection_id).map(|record| UserIdentity {
            username: record.username,
            hostname: record.hostname,
            identified: record.identified,
        })
    }

    fn mark_enabled(&self, connection_id: jchat_core::ConnectionId) -> bool {
        self.users.mark_enabled(connection_id)
    }
}
