//! Line-oriented presentation.
//!
//! Every effect becomes one line tagged with its view: `[room]` or
//! `[#<channel>]`. Status lines carry a severity marker (`*`, `!`, `!!`).

use std::io::Write;

use conclave_app::Presentation;
use conclave_core::{ChannelId, Level};

/// Writes session output as text lines.
#[derive(Debug)]
pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    /// Console writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// The underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Write a line into the room view.
    pub fn note(&mut self, message: &str) {
        self.line(None, message);
    }

    fn line(&mut self, channel: Option<ChannelId>, text: &str) {
        let result = match channel {
            Some(id) => writeln!(self.out, "[#{id}] {text}"),
            None => writeln!(self.out, "[room] {text}"),
        };
        if let Err(err) = result.and_then(|()| self.out.flush()) {
            tracing::warn!(%err, "console write failed");
        }
    }
}

fn marker(level: Level) -> &'static str {
    match level {
        Level::Info => "*",
        Level::Warning => "!",
        Level::Error => "!!",
    }
}

impl<W: Write> Presentation for Console<W> {
    fn display(&mut self, channel: Option<ChannelId>, sender: &str, text: &str) {
        self.line(channel, &format!("<{sender}> {text}"));
    }

    fn inform(&mut self, channel: Option<ChannelId>, level: Level, message: &str) {
        self.line(channel, &format!("{} {message}", marker(level)));
    }

    fn channel_opened(&mut self, channel: ChannelId) {
        self.line(Some(channel), "* view opened");
    }

    fn channel_removed(&mut self, channel: ChannelId) {
        self.line(Some(channel), "* view removed");
    }

    fn close_view(&mut self, channel: ChannelId) {
        self.line(Some(channel), "* view closed");
    }
}
