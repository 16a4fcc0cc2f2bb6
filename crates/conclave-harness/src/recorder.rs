//! Presentation that records everything it is shown.

use conclave_app::Presentation;
use conclave_core::{ChannelId, Level, Scope};
use serde::Serialize;

/// One user-visible effect.
///
/// Channels are raw handles; `None` is the room view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shown {
    /// Chat line.
    Display {
        /// Target view.
        channel: Option<u64>,
        /// Author.
        sender: String,
        /// Message text.
        text: String,
    },
    /// Status line.
    Inform {
        /// Target view.
        channel: Option<u64>,
        /// Severity.
        level: String,
        /// Message text.
        message: String,
    },
    /// A channel view opened.
    Opened {
        /// Channel handle.
        channel: u64,
    },
    /// A channel was removed.
    Removed {
        /// Channel handle.
        channel: u64,
    },
    /// A never-joined channel view closed.
    CloseView {
        /// Channel handle.
        channel: u64,
    },
}

/// [`Presentation`] that keeps an ordered log.
///
/// Change notifications are counted rather than logged; they carry no
/// content and would drown the log.
#[derive(Debug, Default)]
pub struct RecordingPresentation {
    shown: Vec<Shown>,
    changes: usize,
}

impl RecordingPresentation {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything shown so far, in order.
    pub fn shown(&self) -> &[Shown] {
        &self.shown
    }

    /// Number of change notifications received.
    pub fn changes(&self) -> usize {
        self.changes
    }

    /// Chat lines shown in `channel`'s view, as `(sender, text)`.
    pub fn messages(&self, channel: Option<ChannelId>) -> Vec<(&str, &str)> {
        let channel = channel.map(ChannelId::get);
        self.shown
            .iter()
            .filter_map(|shown| match shown {
                Shown::Display { channel: view, sender, text } if *view == channel => {
                    Some((sender.as_str(), text.as_str()))
                },
                _ => None,
            })
            .collect()
    }

    /// Status lines at or above `level`.
    pub fn informs_at_least(&self, level: Level) -> Vec<&str> {
        let wanted: &[&str] = match level {
            Level::Info => &["info", "warning", "error"],
            Level::Warning => &["warning", "error"],
            Level::Error => &["error"],
        };
        self.shown
            .iter()
            .filter_map(|shown| match shown {
                Shown::Inform { level, message, .. } if wanted.contains(&level.as_str()) => {
                    Some(message.as_str())
                },
                _ => None,
            })
            .collect()
    }

    /// Drop the log.
    pub fn clear(&mut self) {
        self.shown.clear();
        self.changes = 0;
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Info => "info",
        Level::Warning => "warning",
        Level::Error => "error",
    }
}

impl Presentation for RecordingPresentation {
    fn display(&mut self, channel: Option<ChannelId>, sender: &str, text: &str) {
        self.shown.push(Shown::Display {
            channel: channel.map(ChannelId::get),
            sender: sender.to_owned(),
            text: text.to_owned(),
        });
    }

    fn inform(&mut self, channel: Option<ChannelId>, level: Level, message: &str) {
        self.shown.push(Shown::Inform {
            channel: channel.map(ChannelId::get),
            level: level_name(level).to_owned(),
            message: message.to_owned(),
        });
    }

    fn changed(&mut self, _scope: &Scope) {
        self.changes += 1;
    }

    fn channel_opened(&mut self, channel: ChannelId) {
        self.shown.push(Shown::Opened { channel: channel.get() });
    }

    fn channel_removed(&mut self, channel: ChannelId) {
        self.shown.push(Shown::Removed { channel: channel.get() });
    }

    fn close_view(&mut self, channel: ChannelId) {
        self.shown.push(Shown::CloseView { channel: channel.get() });
    }
}
