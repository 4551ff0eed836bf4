//! System component message ids and result codes (§4.5, §6).

/// Message ids for the System component.
pub mod message {
    pub const HELLO: u16 = 0;
    pub const HELLO_COMPLETE: u16 = 1;
}

/// The protocol version string every conforming peer must send in `Hello`
/// and the server must match exactly. Latest-revision value per
/// SPEC_FULL.md §9 (supersedes the reference's older `1.0.1`).
pub const PROTOCOL_VERSION: &str = "1.2.6";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SystemResult {
    Ok = 0,
    Fail = 1,
    InvalidProtocolVersion = 2,
}

/// A result code read off the wire did not correspond to a known
/// [`SystemResult`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownSystemResult(pub u16);

impl std::fmt::Display for UnknownSystemResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown system result code {}", self.0)
    }
}

impl std::error::Error for UnknownSystemResult {}

impl SystemResult {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for SystemResult {
    type Error = UnknownSystemResult;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SystemResult::Ok),
            1 => Ok(SystemResult::Fail),
            2 => Ok(SystemResult::InvalidProtocolVersion),
            other => Err(UnknownSystemResult(other)),
        }
    }
}

impl std::fmt::Display for SystemResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemResult::Ok => write!(f, "Ok"),
            SystemResult::Fail => write!(f, "Fail"),
            SystemResult::InvalidProtocolVersion => write!(f, "InvalidProtocolVersion"),
        }
    }
}
