//! One-shot timers requested by the engine.
//!
//! The engine asks for a callback after an interval and may cancel it before
//! it fires. The registry only tracks deadlines; the room drives it with
//! ticks carrying the current time and hands expired tokens back to the
//! engine.

use std::collections::BTreeMap;

use crate::ids::TimerToken;

/// Pending timer deadlines, keyed by engine token.
#[derive(Debug, Clone)]
pub struct TimerRegistry<I> {
    deadlines: BTreeMap<TimerToken, I>,
}

impl<I> Default for TimerRegistry<I> {
    fn default() -> Self {
        Self { deadlines: BTreeMap::new() }
    }
}

impl<I: Copy + Ord> TimerRegistry<I> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` to fire at `deadline`.
    ///
    /// Returns true if an existing deadline for the token was replaced.
    pub fn schedule(&mut self, token: TimerToken, deadline: I) -> bool {
        self.deadlines.insert(token, deadline).is_some()
    }

    /// Cancel a pending timer. Returns false if it was not registered.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        self.deadlines.remove(&token).is_some()
    }

    /// Remove and return every timer due at `now`, earliest deadline first.
    ///
    /// Timers with equal deadlines come out in token order.
    pub fn expire(&mut self, now: I) -> Vec<TimerToken> {
        let mut due: Vec<(I, TimerToken)> = self
            .deadlines
            .iter()
            .filter(|&(_, deadline)| *deadline <= now)
            .map(|(token, deadline)| (*deadline, *token))
            .collect();
        due.sort_unstable();

        for (_, token) in &due {
            self.deadlines.remove(token);
        }
        due.into_iter().map(|(_, token)| token).collect()
    }

    /// Deadline of a pending timer.
    pub fn deadline(&self, token: TimerToken) -> Option<I> {
        self.deadlines.get(&token).copied()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.deadlines.values().min().copied()
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
