//! Core circuit breaker implementation.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::clock::Clock;
use crate::config::{BreakerBuilder, BreakerConfig};
use crate::counts::Counts;
use crate::error::{AllowError, BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::metrics::{Event, MetricSink, TARGET_TAG};
use crate::state::{Events, Machine, State};

/// Inner state of the circuit breaker, shared between handles and permits.
struct BreakerInner {
    machine: Mutex<Machine>,
    target: RwLock<Arc<str>>,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
    clock: Arc<dyn Clock>,
}

impl BreakerInner {
    /// Runs `f` against the machine under the lock, then delivers whatever
    /// events it produced with the lock released.
    fn locked<R>(&self, f: impl FnOnce(&mut Machine, std::time::Instant, &mut Events) -> R) -> R {
        let mut events = Events::new();
        let result = {
            let mut machine = self.machine.lock();
            let now = self.clock.now();
            f(&mut machine, now, &mut events)
        };
        self.deliver(&events);
        result
    }

    fn complete(&self, generation: u64, success: bool) {
        let applied =
            self.locked(|machine, now, events| machine.after_request(generation, success, now, events));

        if !applied {
            tracing::debug!(
                target_id = %self.target.read(),
                generation,
                success,
                "discarding outcome from a superseded window"
            );
        }
    }

    fn deliver(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }

        let target = self.target.read().clone();
        for &event in events {
            match event {
                Event::Transition { from, to, sequence } => {
                    tracing::info!(
                        target_id = %target,
                        %from,
                        %to,
                        sequence,
                        "circuit breaker state changed"
                    );
                }
                Event::Rejected(reason) => {
                    tracing::debug!(target_id = %target, %reason, "circuit breaker refused call");
                }
                _ => tracing::trace!(target_id = %target, event = event.name()),
            }

            let tags = [(TARGET_TAG, &*target)];
            contain("metric sink", || {
                self.metric_sink.record(event.name(), 1, &tags)
            });
            contain("hook", || self.hooks.dispatch(event, &target));
        }
    }
}

// Observers are best effort: a panic in one must not reach the caller.
fn contain(observer: &'static str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::warn!(observer, "circuit breaker observer panicked, event dropped");
    }
}

/// A circuit breaker guarding calls to one logical target.
///
/// Handles are cheap to clone and share the same state. Every operation
/// takes a single lock for a constant amount of work and never blocks on
/// I/O; time-based transitions are applied lazily when the breaker is
/// consulted.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("target", &*self.inner.target.read())
            .field("machine", &*self.inner.machine.lock())
            .finish()
    }
}

impl CircuitBreaker {
    pub(crate) fn new(
        config: BreakerConfig,
        target: String,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let machine = Machine::new(config, clock.now());
        let inner = BreakerInner {
            machine: Mutex::new(machine),
            target: RwLock::new(Arc::from(target)),
            metric_sink,
            hooks,
            clock,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder {
        BreakerBuilder::new()
    }

    /// Sets the target id attached to every event from now on.
    pub fn set_target(&self, target: impl Into<String>) {
        *self.inner.target.write() = Arc::from(target.into());
    }

    /// The target id attached to events.
    pub fn target(&self) -> Arc<str> {
        self.inner.target.read().clone()
    }

    /// The configuration the breaker was built with, after defaults.
    pub fn config(&self) -> BreakerConfig {
        *self.inner.machine.lock().config()
    }

    /// Gets the current state, applying any due time-based transition.
    pub fn state(&self) -> State {
        self.inner
            .locked(|machine, now, events| machine.current(now, events).0)
    }

    /// Gets the current window generation, applying any due time-based
    /// transition.
    pub fn generation(&self) -> u64 {
        self.inner
            .locked(|machine, now, events| machine.current(now, events).1)
    }

    /// Snapshot of the current window's counters, applying any due
    /// time-based transition.
    pub fn counts(&self) -> Counts {
        self.inner.locked(|machine, now, events| {
            machine.current(now, events);
            machine.counts()
        })
    }

    /// Asks to run one attempt.
    ///
    /// On admission the returned [`Permit`] must be used to report the
    /// attempt's outcome exactly once. An attempt that never reports stays
    /// counted as a request without an outcome until its window ends.
    pub fn allow(&self) -> Result<Permit, AllowError> {
        let generation = self
            .inner
            .locked(|machine, now, events| machine.before_request(now, events))?;

        Ok(Permit {
            inner: Arc::clone(&self.inner),
            generation,
        })
    }

    /// Reports the outcome of an attempt admitted by this breaker.
    ///
    /// Has no effect if the permit's window has since been superseded.
    pub fn report(&self, permit: Permit, success: bool) {
        debug_assert!(
            Arc::ptr_eq(&self.inner, &permit.inner),
            "permit reported to a breaker that did not issue it"
        );
        permit.report(success);
    }

    /// Executes a function wrapped by the circuit breaker.
    ///
    /// `Err` results count as failures. If `f` panics the attempt is
    /// reported as failed before the panic continues.
    pub fn call<F, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let pending = PendingReport::new(self.allow()?);
        let result = f();
        pending.report(result.is_ok());
        result.map_err(BreakerError::Operation)
    }
}

// Implement Async support when the feature is enabled
#[cfg(feature = "async")]
impl CircuitBreaker {
    /// Executes an async function wrapped by the circuit breaker.
    ///
    /// Dropping the returned future after admission reports a failure.
    pub async fn call_async<F, Fut, T, E>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let pending = PendingReport::new(self.allow()?);
        let result = f().await;
        pending.report(result.is_ok());
        result.map_err(BreakerError::Operation)
    }

    /// Like [`call_async`](Self::call_async), but gives up after `timeout`
    /// and counts the attempt as failed.
    pub async fn call_async_timeout<F, Fut, T, E>(
        &self,
        timeout: std::time::Duration,
        f: F,
    ) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let pending = PendingReport::new(self.allow()?);
        match tokio::time::timeout(timeout, f()).await {
            Ok(result) => {
                pending.report(result.is_ok());
                result.map_err(BreakerError::Operation)
            }
            Err(_) => {
                pending.report(false);
                Err(BreakerError::Timeout)
            }
        }
    }
}

/// Completion token for an admitted attempt.
///
/// Carries the window generation it was issued under; reporting after that
/// window ended is silently ignored.
#[must_use = "every admitted attempt must report its outcome"]
pub struct Permit {
    inner: Arc<BreakerInner>,
    generation: u64,
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("target", &*self.inner.target.read())
            .field("generation", &self.generation)
            .finish()
    }
}

impl Permit {
    /// Generation of the window the attempt was admitted in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reports the attempt's outcome.
    pub fn report(self, success: bool) {
        self.inner.complete(self.generation, success);
    }

    /// Reports a successful attempt.
    pub fn success(self) {
        self.report(true);
    }

    /// Reports a failed attempt.
    pub fn failure(self) {
        self.report(false);
    }
}

/// Reports failure for a permit that is dropped without an explicit outcome,
/// which covers panics and cancelled futures.
struct PendingReport {
    permit: Option<Permit>,
}

impl PendingReport {
    fn new(permit: Permit) -> Self {
        Self {
            permit: Some(permit),
        }
    }

    fn report(mut self, success: bool) {
        if let Some(permit) = self.permit.take() {
            permit.report(success);
        }
    }
}

impl Drop for PendingReport {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            permit.failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::strategy::Strategy;
    use std::time::Duration;

    #[test]
    fn panicking_call_counts_as_failure() {
        let breaker = CircuitBreaker::builder()
            .strategy(Strategy::consecutive_failures(1))
            .clock(ManualClock::new())
            .build();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            breaker.call(|| -> Result<(), std::io::Error> { panic!("guarded operation blew up") })
        }));

        assert!(outcome.is_err());
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn panicking_sink_does_not_disturb_the_gate() {
        struct Exploding;
        impl MetricSink for Exploding {
            fn record(&self, _: &str, _: u64, _: &[(&str, &str)]) {
                panic!("sink failure");
            }
        }

        let breaker = CircuitBreaker::builder()
            .metric_sink(Exploding)
            .clock(ManualClock::new())
            .build();

        let permit = breaker.allow().expect("closed breaker admits");
        permit.success();
        assert_eq!(breaker.counts().total_successes(), 1);
    }

    #[test]
    fn clones_share_state() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::builder()
            .strategy(Strategy::consecutive_failures(1))
            .open_timeout(Duration::from_secs(5))
            .clock(clock.clone())
            .build();
        let other = breaker.clone();

        breaker.allow().expect("admitted").failure();

        assert_eq!(other.state(), State::Open);
        assert_eq!(other.allow().unwrap_err(), AllowError::OpenState);
    }
}
