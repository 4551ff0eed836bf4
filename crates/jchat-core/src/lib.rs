//! Transport-agnostic plumbing shared by the jchat server and client:
//! connection identity, the component/dispatch model, event fan-out, and
//! hostname masking.

mod component;
mod connection;
mod dispatcher;
mod event;
mod hash;

pub use component::{Component, DispatchContext, DispatchError};
pub use connection::{ConnectionId, ConnectionIdAllocator, ConnectionRegistry, ConnectionUnreachable};
pub use dispatcher::{ComponentAlreadyRegistered, Dispatcher};
pub use event::Event;
pub use hash::hash_hostname;
