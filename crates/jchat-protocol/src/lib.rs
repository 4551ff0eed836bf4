//! Component ids, per-component message ids, result code enumerations, and
//! protocol-wide constants (version string, size limits). Pure data: no
//! buffers, no dispatch, no state machines — those live in `jchat-wire` and
//! `jchat-core`.

mod channel;
mod component;
mod limits;
mod system;
mod user;

pub use channel::{ChannelResult, UnknownChannelResult, message as channel_message};
pub use component::{ComponentId, MAX_COMPONENT_ID, UnknownComponentId};
pub use limits::{
    CHANNEL_NAME_MAX_LEN, CHANNEL_NAME_PREFIX, MESSAGE_MAX_LEN, USERNAME_MAX_LEN,
    is_valid_channel_name, is_valid_username,
};
pub use system::{PROTOCOL_VERSION, SystemResult, UnknownSystemResult, message as system_message};
pub use user::{UnknownUserResult, UserResult, message as user_message};
