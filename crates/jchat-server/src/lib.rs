//! Chat server: per-connection user records, channels, and the
//! System/User/Channel component implementations that back them (§4.6–§4.8).
//! The accept loop and CLI live in `main.rs`; everything else is exposed
//! here so integration tests can wire a server `Dispatcher` directly
//! without going through a real socket.

pub mod channel_state;
pub mod components;
pub mod user_directory;
pub mod user_state;

pub use components::channel::ChannelComponentServer;
pub use components::system::SystemComponentServer;
pub use components::user::UserComponentServer;
pub use user_directory::{UserDirectory, UserIdentity};
pub use user_state::{UserRecord, UserRegistry};
