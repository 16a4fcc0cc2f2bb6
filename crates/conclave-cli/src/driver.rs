//! Console driver.
//!
//! Implements [`Driver`] over a line reader and a writer. Lines are parsed
//! with [`crate::input`]; transport payloads go to the in-process
//! [`PeerGroup`] and, when requested, are echoed so they can be relayed by
//! hand.

use std::{collections::VecDeque, io, io::Write, time::Instant};

use conclave_app::{Driver, HostEvent};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::{
    PeerGroup,
    input::{HELP, Input, parse_line},
};

/// Console driver errors.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// I/O error on the console.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Driver options.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleOptions {
    /// How long to wait for input before delivering a clock tick.
    pub poll_interval: std::time::Duration,
    /// Print every payload sent over the transport.
    pub show_wire: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self { poll_interval: std::time::Duration::from_millis(100), show_wire: false }
    }
}

/// [`Driver`] for a line-mode console.
pub struct ConsoleDriver<R, W> {
    lines: Lines<R>,
    out: W,
    options: ConsoleOptions,
    pending: VecDeque<HostEvent>,
    peers: PeerGroup,
    eof: bool,
}

impl<R, W> ConsoleDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    /// Create a driver.
    ///
    /// The local user is reported as having joined the chat, followed by
    /// `greetings` from already running peers.
    pub fn new(
        input: R,
        out: W,
        peers: PeerGroup,
        greetings: Vec<(String, String)>,
        options: ConsoleOptions,
    ) -> Self {
        let mut driver = Self {
            lines: input.lines(),
            out,
            options,
            pending: VecDeque::from([HostEvent::ChatJoined]),
            peers,
            eof: false,
        };
        driver.queue(greetings);
        driver
    }

    /// The in-process peers.
    pub fn peers(&self) -> &PeerGroup {
        &self.peers
    }

    fn queue(&mut self, payloads: Vec<(String, String)>) {
        self.pending
            .extend(payloads.into_iter().map(|(sender, payload)| HostEvent::Received { sender, payload }));
    }

    fn on_line(&mut self, line: &str) -> Result<Option<HostEvent>, ConsoleError> {
        match parse_line(line) {
            Ok(Input::Host(event)) => Ok(Some(event)),
            Ok(Input::Help) => {
                for (usage, about) in HELP {
                    writeln!(self.out, "[room] {usage:<26} {about}")?;
                }
                Ok(None)
            },
            Err(err) => {
                writeln!(self.out, "[room] ! {err}")?;
                Ok(None)
            },
        }
    }
}

impl<R, W> Driver for ConsoleDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    type Error = ConsoleError;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<HostEvent>, Self::Error> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        if self.eof {
            return Ok(Some(HostEvent::Quit));
        }

        tokio::select! {
            biased;

            line = self.lines.next_line() => {
                match line? {
                    Some(line) => self.on_line(line.trim_end()),
                    None => {
                        tracing::debug!("console input closed");
                        self.eof = true;
                        Ok(Some(HostEvent::Quit))
                    },
                }
            }

            () = tokio::time::sleep(self.options.poll_interval) => {
                let replies = self.peers.tick(Instant::now());
                self.queue(replies);
                Ok(self.pending.pop_front())
            }
        }
    }

    async fn transmit(&mut self, payload: String) -> Result<(), Self::Error> {
        if self.options.show_wire || self.peers.is_empty() {
            writeln!(self.out, "[wire] -> {payload}")?;
        }
        let replies = self.peers.relay(&payload);
        if self.options.show_wire {
            for (sender, reply) in &replies {
                writeln!(self.out, "[wire] <- {sender}: {reply}")?;
            }
        }
        self.queue(replies);
        Ok(())
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn stop(&mut self) {
        let farewells = self.peers.close();
        tracing::debug!(farewells = farewells.len(), "peers stopped");
        if let Err(err) = self.out.flush() {
            tracing::warn!(%err, "console flush failed");
        }
    }
}
