//! Room configuration.

/// Default prefix that marks a chat line as a local command.
pub const DEFAULT_COMMAND_PREFIX: char = '.';

/// Per-conversation settings chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomConfig {
    /// Whether the secure protocol is used at all.
    ///
    /// When false the room never starts a session and relays chat lines to
    /// the transport unchanged.
    pub protocol_enabled: bool,

    /// Prefix that turns a chat line into a local command.
    pub command_prefix: char,

    /// Clear every participant's promotion flag when someone joins a channel.
    pub demote_on_join: bool,

    /// Issue `Connect` to the engine as part of `start`.
    pub auto_connect: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            protocol_enabled: true,
            command_prefix: DEFAULT_COMMAND_PREFIX,
            demote_on_join: true,
            auto_connect: true,
        }
    }
}

impl RoomConfig {
    /// Strip the command prefix from `text` if present.
    pub fn as_command<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.strip_prefix(self.command_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefix_is_dot() {
        let config = RoomConfig::default();
        assert_eq!(config.as_command(".help"), Some("help"));
        assert_eq!(config.as_command("hello."), None);
    }

    #[test]
    fn custom_prefix() {
        let config = RoomConfig { command_prefix: '/', ..RoomConfig::default() };
        assert_eq!(config.as_command("/whoami"), Some("whoami"));
        assert_eq!(config.as_command(".whoami"), None);
    }
}
