//! Opaque handles minted by the external engine.
//!
//! The engine identifies channels and timers with its own handles. The core
//! only compares them for identity and uses them as map keys; it never
//! interprets their value.

use std::{fmt, num::ParseIntError, str::FromStr};

/// Engine-assigned channel handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Wrap a raw engine handle.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine handle.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChannelId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Engine-assigned timer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Wrap a raw engine handle.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw engine handle.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_display_parses_back() {
        let id = ChannelId::new(140_734_512);
        assert_eq!(id.to_string().parse::<ChannelId>(), Ok(id));
    }

    #[test]
    fn channel_id_rejects_garbage() {
        assert!("0x10".parse::<ChannelId>().is_err());
        assert!("".parse::<ChannelId>().is_err());
        assert!("-3".parse::<ChannelId>().is_err());
    }
}
