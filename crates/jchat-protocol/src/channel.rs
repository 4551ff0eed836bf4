//! Channel component message ids and result codes (§4.8, §4.9, §6).

pub mod message {
    pub const JOIN_CHANNEL: u16 = 0;
    pub const JOIN_CHANNEL_COMPLETE: u16 = 1;
    pub const LEAVE_CHANNEL: u16 = 2;
    pub const LEAVE_CHANNEL_COMPLETE: u16 = 3;
    pub const SEND_MESSAGE: u16 = 4;
    pub const SEND_MESSAGE_COMPLETE: u16 = 5;
    pub const OP_USER: u16 = 6;
    pub const OP_USER_COMPLETE: u16 = 7;
    pub const DEOP_USER: u16 = 8;
    pub const DEOP_USER_COMPLETE: u16 = 9;
    pub const KICK_USER: u16 = 10;
    pub const KICK_USER_COMPLETE: u16 = 11;
    pub const BAN_USER: u16 = 12;
    pub const BAN_USER_COMPLETE: u16 = 13;
    pub const UNBAN_USER: u16 = 14;
    pub const UNBAN_USER_COMPLETE: u16 = 15;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ChannelResult {
    Ok = 0,
    Fail = 1,
    NotIdentified = 2,
    InvalidChannelName = 3,
    InvalidUsername = 4,
    NotInChannel = 5,
    NotPermitted = 6,
    UserNotInChannel = 7,
    ChannelCreated = 8,
    ChannelNameTooLong = 9,
    AlreadyInChannel = 10,
    BannedFromChannel = 11,
    UserJoined = 12,
    ChannelDestroyed = 13,
    UserLeft = 14,
    InvalidMessage = 15,
    MessageTooLong = 16,
    MessageSent = 17,
    AlreadyOperator = 18,
    CannotOpSelf = 19,
    UserOpped = 20,
    AlreadyNotOperator = 21,
    UserDeopped = 22,
    CannotKickSelf = 23,
    UserKicked = 24,
    AlreadyBanned = 25,
    CannotBanSelf = 26,
    UserBanned = 27,
    NotBanned = 28,
    CannotUnbanSelf = 29,
    UserUnbanned = 30,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownChannelResult(pub u16);

impl std::fmt::Display for UnknownChannelResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown channel result code {}", self.0)
    }
}

impl std::error::Error for UnknownChannelResult {}

impl ChannelResult {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for ChannelResult {
    type Error = UnknownChannelResult;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use ChannelResult as R;
        match value {
            0 => Ok(R::Ok),
            1 => Ok(R::Fail),
            2 => Ok(R::NotIdentified),
            3 => Ok(R::InvalidChannelName),
            4 => Ok(R::InvalidUsername),
            5 => Ok(R::NotInChannel),
            6 => Ok(R::NotPermitted),
            7 => Ok(R::UserNotInChannel),
            8 => Ok(R::ChannelCreated),
            9 => Ok(R::ChannelNameTooLong),
            10 => Ok(R::AlreadyInChannel),
            11 => Ok(R::BannedFromChannel),
            12 => Ok(R::UserJoined),
            13 => Ok(R::ChannelDestroyed),
            14 => Ok(R::UserLeft),
            15 => Ok(R::InvalidMessage),
            16 => Ok(R::MessageTooLong),
            17 => Ok(R::MessageSent),
            18 => Ok(R::AlreadyOperator),
            19 => Ok(R::CannotOpSelf),
            20 => Ok(R::UserOpped),
            21 => Ok(R::AlreadyNotOperator),
            22 => Ok(R::UserDeopped),
            23 => Ok(R::CannotKickSelf),
            24 => Ok(R::UserKicked),
            25 => Ok(R::AlreadyBanned),
            26 => Ok(R::CannotBanSelf),
            27 => Ok(R::UserBanned),
            28 => Ok(R::NotBanned),
            29 => Ok(R::CannotUnbanSelf),
            30 => Ok(R::UserUnbanned),
            other => Err(UnknownChannelResult(other)),
        }
    }
}

impl std::fmt::Display for ChannelResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
