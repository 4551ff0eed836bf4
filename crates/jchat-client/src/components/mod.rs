//! The three client-side mirrors of the server's components (§4.5, §4.7,
//! §4.9).

pub mod channel;
pub mod system;
pub mod user;
