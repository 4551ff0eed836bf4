//! Component identifiers (§6: `System=0`, `User=1`, `Channel=2`, `Max=3`).

/// A component id read off the wire did not fall in `0..MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownComponentId(pub u8);

impl std::fmt::Display for UnknownComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown component id {}", self.0)
    }
}

impl std::error::Error for UnknownComponentId {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentId {
    System = 0,
    User = 1,
    Channel = 2,
}

/// Sentinel: any id greater than or equal to this forces a connection drop.
pub const MAX_COMPONENT_ID: u8 = 3;

impl ComponentId {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn description(self) -> &'static str {
        match self {
            ComponentId::System => "protocol version handshake",
            ComponentId::User => "identification and direct messaging",
            ComponentId::Channel => "channel membership, operators, and bans",
        }
    }
}

impl TryFrom<u8> for ComponentId {
    type Error = UnknownComponentId;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ComponentId::System),
            1 => Ok(ComponentId::User),
            2 => Ok(ComponentId::Channel),
            other => Err(UnknownComponentId(other)),
        }
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentId::System => write!(f, "System"),
            ComponentId::User => write!(f, "User"),
            ComponentId::Channel => write!(f, "Channel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_sentinel_is_out_of_range() {
        assert!(ComponentId::try_from(MAX_COMPONENT_ID).is_err());
        assert!(ComponentId::try_from(MAX_COMPONENT_ID - 1).is_ok());
    }
}
