//! Call tracing and latency watchdog for engine sessions.
//!
//! [`Watchdog`] wraps any [`Engine`] and forwards every call unchanged. Each
//! call is traced with the local username and timed against the
//! environment clock; calls slower than
//! [`WatchdogConfig::slow_call_threshold`] are logged at warn level and
//! counted. Wrap the factory with [`WatchdogFactory`] to guard every
//! session it opens.

use std::time::Duration;

use conclave_core::{ChannelId, Environment, PublicKey, TimerToken};

use crate::{
    EngineError,
    engine::{Engine, EngineFactory, EngineResult},
};

/// Default latency above which an engine call is reported.
pub const DEFAULT_SLOW_CALL_THRESHOLD: Duration = Duration::from_millis(500);

/// Watchdog configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Calls taking longer than this are reported.
    pub slow_call_threshold: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { slow_call_threshold: DEFAULT_SLOW_CALL_THRESHOLD }
    }
}

/// Engine wrapper that traces and times every call.
pub struct Watchdog<En, Env> {
    inner: En,
    env: Env,
    user: String,
    config: WatchdogConfig,
    calls: u64,
    slow_calls: u64,
}

impl<En, Env> Watchdog<En, Env>
where
    En: Engine,
    Env: Environment,
{
    /// Wrap `inner`, attributing calls to `user`.
    pub fn new(inner: En, env: Env, user: impl Into<String>, config: WatchdogConfig) -> Self {
        Self { inner, env, user: user.into(), config, calls: 0, slow_calls: 0 }
    }

    /// The wrapped engine.
    pub fn inner(&self) -> &En {
        &self.inner
    }

    /// Mutable access to the wrapped engine.
    pub fn inner_mut(&mut self) -> &mut En {
        &mut self.inner
    }

    /// Total calls forwarded.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Calls that exceeded the threshold.
    pub fn slow_calls(&self) -> u64 {
        self.slow_calls
    }

    fn guard(&mut self, call: &'static str, f: impl FnOnce(&mut En) -> EngineResult) -> EngineResult {
        tracing::trace!(user = %self.user, call, "{}:engine::{}", self.user, call);

        let started = self.env.now();
        let result = f(&mut self.inner);
        let elapsed = self.env.now() - started;

        self.calls += 1;
        if elapsed > self.config.slow_call_threshold {
            self.slow_calls += 1;
            tracing::warn!(
                user = %self.user,
                call,
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_call_threshold.as_millis() as u64,
                "slow engine call"
            );
        }
        result
    }
}

impl<En, Env> Engine for Watchdog<En, Env>
where
    En: Engine,
    Env: Environment,
{
    fn connect(&mut self) -> EngineResult {
        self.guard("connect", |engine| engine.connect())
    }

    fn disconnect(&mut self) -> EngineResult {
        self.guard("disconnect", |engine| engine.disconnect())
    }

    fn receive(&mut self, sender: &str, payload: &str) -> EngineResult {
        self.guard("receive", |engine| engine.receive(sender, payload))
    }

    fn user_left(&mut self, name: &str) -> EngineResult {
        self.guard("user_left", |engine| engine.user_left(name))
    }

    fn create_channel(&mut self) -> EngineResult {
        self.guard("create_channel", |engine| engine.create_channel())
    }

    fn search_channels(&mut self) -> EngineResult {
        self.guard("search_channels", |engine| engine.search_channels())
    }

    fn join_channel(&mut self, channel: ChannelId) -> EngineResult {
        self.guard("join_channel", |engine| engine.join_channel(channel))
    }

    fn invite(&mut self, channel: ChannelId, name: &str, public_key: &PublicKey) -> EngineResult {
        self.guard("invite", |engine| engine.invite(channel, name, public_key))
    }

    fn send_chat(&mut self, channel: Option<ChannelId>, text: &str) -> EngineResult {
        self.guard("send_chat", |engine| engine.send_chat(channel, text))
    }

    fn authorize(&mut self, channel: Option<ChannelId>, name: &str) -> EngineResult {
        self.guard("authorize", |engine| engine.authorize(channel, name))
    }

    fn leave(&mut self, channel: ChannelId, suppress_callback: bool) -> EngineResult {
        self.guard("leave", |engine| engine.leave(channel, suppress_callback))
    }

    fn fire_timer(&mut self, token: TimerToken) -> EngineResult {
        self.guard("fire_timer", |engine| engine.fire_timer(token))
    }
}

/// Factory wrapper that guards every opened session with a [`Watchdog`].
pub struct WatchdogFactory<F, Env> {
    inner: F,
    env: Env,
    config: WatchdogConfig,
}

impl<F, Env> WatchdogFactory<F, Env> {
    /// Wrap `inner`.
    pub fn new(inner: F, env: Env, config: WatchdogConfig) -> Self {
        Self { inner, env, config }
    }

    /// The wrapped factory.
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F, Env> EngineFactory for WatchdogFactory<F, Env>
where
    F: EngineFactory,
    Env: Environment,
{
    type Engine = Watchdog<F::Engine, Env>;

    fn open(&mut self, username: &str, public_key: &PublicKey) -> Result<Self::Engine, EngineError> {
        tracing::trace!(user = username, "{username}:engine::open");
        let engine = self.inner.open(username, public_key)?;
        Ok(Watchdog::new(engine, self.env.clone(), username, self.config))
    }
}
