//! Numeric replies the services react to.

/// Server numerics consumed by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Response {
    /// 001 - registration complete
    RPL_WELCOME,
    /// 318 - end of WHOIS
    RPL_ENDOFWHOIS,
    /// 353 - NAMES reply
    RPL_NAMREPLY,
    /// 379 - WHOIS modes
    RPL_WHOISMODES,
    /// 381 - OPER accepted
    RPL_YOUREOPER,
    /// 401 - no such nick/channel
    ERR_NOSUCHNICK,
    /// 433 - nickname in use
    ERR_NICKNAMEINUSE,
}

impl Response {
    /// Numeric code of this reply.
    pub const fn code(self) -> u16 {
        match self {
            Self::RPL_WELCOME => 1,
            Self::RPL_ENDOFWHOIS => 318,
            Self::RPL_NAMREPLY => 353,
            Self::RPL_WHOISMODES => 379,
            Self::RPL_YOUREOPER => 381,
            Self::ERR_NOSUCHNICK => 401,
            Self::ERR_NICKNAMEINUSE => 433,
        }
    }

    /// Map a three-digit command token to a known reply.
    pub fn from_command(command: &str) -> Option<Self> {
        if command.len() != 3 {
            return None;
        }
        match command.parse::<u16>().ok()? {
            1 => Some(Self::RPL_WELCOME),
            318 => Some(Self::RPL_ENDOFWHOIS),
            353 => Some(Self::RPL_NAMREPLY),
            379 => Some(Self::RPL_WHOISMODES),
            381 => Some(Self::RPL_YOUREOPER),
            401 => Some(Self::ERR_NOSUCHNICK),
            433 => Some(Self::ERR_NICKNAMEINUSE),
            _ => None,
        }
    }
}
