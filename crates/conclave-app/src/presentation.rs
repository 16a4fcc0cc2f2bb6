//! Frontend notifications.
//!
//! A [`Presentation`] renders what the room reports. It never mutates room
//! state; user input flows back through [`crate::Session`].

use conclave_core::{ChannelId, Level, Scope};

/// Receives the user-visible effects of a session.
///
/// `channel: None` addresses the room view.
pub trait Presentation {
    /// Show a chat message.
    fn display(&mut self, channel: Option<ChannelId>, sender: &str, text: &str);

    /// Show a status line.
    fn inform(&mut self, channel: Option<ChannelId>, level: Level, message: &str);

    /// Displayed state changed.
    fn changed(&mut self, _scope: &Scope) {}

    /// A channel appeared.
    fn channel_opened(&mut self, _channel: ChannelId) {}

    /// A channel disappeared.
    fn channel_removed(&mut self, _channel: ChannelId) {}

    /// Close the view of a channel the local user never joined.
    fn close_view(&mut self, _channel: ChannelId) {}
}

impl<P: Presentation + ?Sized> Presentation for Box<P> {
    fn display(&mut self, channel: Option<ChannelId>, sender: &str, text: &str) {
        (**self).display(channel, sender, text);
    }

    fn inform(&mut self, channel: Option<ChannelId>, level: Level, message: &str) {
        (**self).inform(channel, level, message);
    }

    fn changed(&mut self, scope: &Scope) {
        (**self).changed(scope);
    }

    fn channel_opened(&mut self, channel: ChannelId) {
        (**self).channel_opened(channel);
    }

    fn channel_removed(&mut self, channel: ChannelId) {
        (**self).channel_removed(channel);
    }

    fn close_view(&mut self, channel: ChannelId) {
        (**self).close_view(channel);
    }
}
