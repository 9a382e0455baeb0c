//! Circuit breaker state machine implementation.

use std::fmt;
use std::time::Instant;

use smallvec::SmallVec;

use crate::config::BreakerConfig;
use crate::counts::Counts;
use crate::error::AllowError;
use crate::metrics::Event;

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed,

    /// Circuit is open and operations are rejected.
    Open,

    /// Circuit is allowing a limited number of operations to test recovery.
    HalfOpen,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        })
    }
}

/// Events produced while the machine is locked, delivered after unlocking.
pub(crate) type Events = SmallVec<[Event; 4]>;

/// The breaker aggregate: state, window generation, expiry and counters.
///
/// Time only enters through the `now` arguments. Nothing here blocks or calls
/// out; observable effects are appended to an [`Events`] buffer.
#[derive(Debug)]
pub(crate) struct Machine {
    config: BreakerConfig,
    state: State,
    generation: u64,
    transitions: u64,
    // Closed: end of the counting window, `None` if windows never roll.
    // Open: end of the cooldown. HalfOpen: always `None`.
    expiry: Option<Instant>,
    counts: Counts,
}

impl Machine {
    pub(crate) fn new(config: BreakerConfig, now: Instant) -> Self {
        let mut machine = Self {
            config,
            state: State::Closed,
            generation: 0,
            transitions: 0,
            expiry: None,
            counts: Counts::new(),
        };
        machine.next_window(now);
        machine
    }

    pub(crate) fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub(crate) fn counts(&self) -> Counts {
        self.counts
    }

    /// Applies pending time-based transitions and returns the resulting
    /// state and generation.
    pub(crate) fn current(&mut self, now: Instant, events: &mut Events) -> (State, u64) {
        match self.state {
            State::Closed => {
                if self.expiry.is_some_and(|expiry| now >= expiry) {
                    self.next_window(now);
                }
            }
            State::Open => {
                if self.expiry.is_some_and(|expiry| now >= expiry) {
                    self.set_state(State::HalfOpen, now, events);
                }
            }
            State::HalfOpen => {}
        }

        (self.state, self.generation)
    }

    /// Admission check. Returns the generation the attempt belongs to.
    pub(crate) fn before_request(
        &mut self,
        now: Instant,
        events: &mut Events,
    ) -> Result<u64, AllowError> {
        let (state, generation) = self.current(now, events);

        let refused = match state {
            State::Open => Some(AllowError::OpenState),
            State::HalfOpen if self.counts.requests() >= u64::from(self.config.max_probes) => {
                Some(AllowError::TooManyRequests)
            }
            _ => None,
        };
        if let Some(reason) = refused {
            events.push(Event::Rejected(reason));
            return Err(reason);
        }

        events.push(Event::Admitted(state));
        self.counts.on_request();
        Ok(generation)
    }

    /// Records the outcome of an attempt admitted under `before`.
    ///
    /// Returns false when the attempt's window has been superseded, in which
    /// case counters and state are left untouched.
    pub(crate) fn after_request(
        &mut self,
        before: u64,
        success: bool,
        now: Instant,
        events: &mut Events,
    ) -> bool {
        events.push(if success {
            Event::Succeeded
        } else {
            Event::Failed
        });

        let (state, generation) = self.current(now, events);
        if generation != before {
            return false;
        }

        if success {
            self.on_success(state, now, events);
        } else {
            self.on_failure(state, now, events);
        }
        true
    }

    fn on_success(&mut self, state: State, now: Instant, events: &mut Events) {
        match state {
            State::Closed => self.counts.on_success(),
            State::HalfOpen => {
                self.counts.on_success();
                if self.counts.consecutive_successes() >= u64::from(self.config.max_probes) {
                    self.set_state(State::Closed, now, events);
                }
            }
            // Any transition bumps the generation, so no live permit can
            // belong to an open window.
            State::Open => {}
        }
    }

    fn on_failure(&mut self, state: State, now: Instant, events: &mut Events) {
        match state {
            State::Closed => {
                self.counts.on_failure();
                if self.config.strategy.should_open(&self.counts) {
                    self.set_state(State::Open, now, events);
                }
            }
            State::HalfOpen => {
                self.counts.on_failure();
                self.set_state(State::Open, now, events);
            }
            State::Open => {}
        }
    }

    fn set_state(&mut self, to: State, now: Instant, events: &mut Events) {
        if self.state == to {
            return;
        }

        let from = self.state;
        self.state = to;
        self.transitions += 1;
        self.next_window(now);
        events.push(Event::Transition {
            from,
            to,
            sequence: self.transitions,
        });
    }

    fn next_window(&mut self, now: Instant) {
        self.generation += 1;
        self.counts.clear();

        // An expiry too far out to represent never arrives.
        self.expiry = match self.state {
            State::Closed if self.config.closed_window.is_zero() => None,
            State::Closed => now.checked_add(self.config.closed_window),
            State::Open => now.checked_add(self.config.open_timeout),
            State::HalfOpen => None,
        };
    }
}
