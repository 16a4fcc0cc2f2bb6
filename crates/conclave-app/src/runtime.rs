//! Generic runtime for session orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Session`]: room state machine bound to an engine and a frontend
//! - [`Driver`]: platform-specific I/O

use conclave_core::Environment;

use crate::{Driver, EngineFactory, HostEvent, Presentation, Session};

/// Event loop over a [`Session`] and a [`Driver`].
pub struct Runtime<D, F, P, E>
where
    D: Driver,
    F: EngineFactory,
    P: Presentation,
    E: Environment,
{
    driver: D,
    session: Session<F, P, E>,
}

impl<D, F, P, E> Runtime<D, F, P, E>
where
    D: Driver<Instant = E::Instant>,
    F: EngineFactory,
    P: Presentation,
    E: Environment,
{
    /// Create a runtime.
    pub fn new(driver: D, session: Session<F, P, E>) -> Self {
        Self { driver, session }
    }

    /// The session being driven.
    pub fn session(&self) -> &Session<F, P, E> {
        &self.session
    }

    /// Run until the driver reports [`HostEvent::Quit`] or fails.
    ///
    /// Starts the session, then repeatedly:
    /// 1. Polls the driver for a host event and applies it
    /// 2. Delivers a clock tick so due engine timers fire
    /// 3. Sends accumulated transport payloads
    ///
    /// The session is closed before returning, including on driver errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<Session<F, P, E>, D::Error> {
        self.session.start();
        let result = self.run_loop().await;

        self.session.close();
        let flushed = self.flush().await;
        self.driver.stop();

        result.and(flushed).map(|()| self.session)
    }

    async fn run_loop(&mut self) -> Result<(), D::Error> {
        self.flush().await?;
        loop {
            if self.process_cycle().await? {
                return Ok(());
            }
        }
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the runtime should quit.
    async fn process_cycle(&mut self) -> Result<bool, D::Error> {
        if let Some(event) = self.driver.poll_event().await? {
            if event == HostEvent::Quit {
                tracing::debug!("quit requested");
                return Ok(true);
            }
            self.apply(event);
        }

        let now = self.driver.now();
        self.session.tick(now);
        self.flush().await?;
        Ok(false)
    }

    fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::Line(text) => self.session.send_line(text),
            HostEvent::Received { sender, payload } => self.session.received(sender, payload),
            HostEvent::ChatJoined => self.session.chat_joined(),
            HostEvent::ChatLeft => self.session.chat_left(),
            HostEvent::UserLeft { name } => self.session.host_user_left(&name),
            HostEvent::Focus(channel) => self.session.focus(channel),
            HostEvent::Unfocus => self.session.unfocus(),
            HostEvent::Quit => {},
        }
    }

    async fn flush(&mut self) -> Result<(), D::Error> {
        for payload in self.session.take_outgoing() {
            self.driver.transmit(payload).await?;
        }
        Ok(())
    }
}
