//! Chat client: local user/channel mirror state and the System/User/Channel
//! components that keep it in sync with the server (§4.5, §4.7, §4.9). The
//! interactive REPL lives in `main.rs`; everything else is exposed here so
//! integration tests can wire a client `Dispatcher` directly without going
//! through a real socket.

pub mod channel_state;
pub mod components;
pub mod outbound;
pub mod user_state;

pub use channel_state::{ChannelMember, ChannelMirror, MirroredChannel};
pub use components::channel::{ChannelComponentClient, ChannelEvent};
pub use components::system::{HandshakeComplete, SystemComponentClient};
pub use components::user::{IdentifyComplete, MessageReceived, SendMessageComplete, UserComponentClient};
pub use outbound::{NotConnected, OutboundHandle};
pub use user_state::{LocalUser, LocalUserState};
