//! User component message ids and result codes (§4.6, §4.7, §6).

pub mod message {
    pub const IDENTIFY: u16 = 0;
    pub const IDENTIFY_COMPLETE: u16 = 1;
    pub const SEND_MESSAGE: u16 = 2;
    pub const SEND_MESSAGE_COMPLETE: u16 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum UserResult {
    Ok = 0,
    Fail = 1,
    NotIdentified = 2,
    InvalidUsername = 3,
    UsernameTooLong = 4,
    UsernameInUse = 5,
    AlreadyIdentified = 6,
    InvalidMessage = 7,
    MessageTooLong = 8,
    UserNotIdentified = 9,
    CannotMessageSelf = 10,
    MessageSent = 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownUserResult(pub u16);

impl std::fmt::Display for UnknownUserResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown user result code {}", self.0)
    }
}

impl std::error::Error for UnknownUserResult {}

impl UserResult {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for UserResult {
    type Error = UnknownUserResult;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UserResult::Ok),
            1 => Ok(UserResult::Fail),
            2 => Ok(UserResult::NotIdentified),
            3 => Ok(UserResult::InvalidUsername),
            4 => Ok(UserResult::UsernameTooLong),
            5 => Ok(UserResult::UsernameInUse),
            6 => Ok(UserResult::AlreadyIdentified),
            7 => Ok(UserResult::InvalidMessage),
            8 => Ok(UserResult::MessageTooLong),
            9 => Ok(UserResult::UserNotIdentified),
            10 => Ok(UserResult::CannotMessageSelf),
            11 => Ok(UserResult::MessageSent),
            other => Err(UnknownUserResult(other)),
        }
    }
}

impl std::fmt::Display for UserResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
