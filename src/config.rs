//! Configuration for circuit breakers.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::strategy::Strategy;

/// Half-open probe quota used when zero is configured.
pub const DEFAULT_MAX_PROBES: u32 = 50;

/// Open-state cooldown used when zero is configured.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);

/// Closed-state window of the consecutive-failures preset.
pub const DEFAULT_CONSECUTIVE_FAILURES_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Closed-state window of the failure-ratio preset.
pub const DEFAULT_FAILURE_RATIO_WINDOW: Duration = Duration::from_millis(200);

/// Immutable settings of a single breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    /// Trial calls admitted while half-open, and the success run that closes
    /// the breaker again.
    pub max_probes: u32,

    /// How long closed-state counters accumulate before they roll over.
    /// Zero means they only reset on state transitions.
    pub closed_window: Duration,

    /// How long the breaker stays open before probing.
    pub open_timeout: Duration,

    /// Rule deciding when a closed breaker opens.
    pub strategy: Strategy,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_probes: DEFAULT_MAX_PROBES,
            closed_window: Duration::ZERO,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            strategy: Strategy::Never,
        }
    }
}

impl BreakerConfig {
    /// Replaces zero or invalid values with the documented defaults.
    pub fn normalized(self) -> Self {
        let max_probes = if self.max_probes == 0 {
            tracing::warn!(default = DEFAULT_MAX_PROBES, "zero probe quota, using default");
            DEFAULT_MAX_PROBES
        } else {
            self.max_probes
        };

        let open_timeout = if self.open_timeout.is_zero() {
            tracing::warn!(
                default_ms = DEFAULT_OPEN_TIMEOUT.as_millis() as u64,
                "zero open timeout, using default"
            );
            DEFAULT_OPEN_TIMEOUT
        } else {
            self.open_timeout
        };

        Self {
            max_probes,
            closed_window: self.closed_window,
            open_timeout,
            strategy: self.strategy.normalized(),
        }
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder {
    config: BreakerConfig,
    target: String,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    clock: Arc<dyn Clock>,
}

impl Default for BreakerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: BreakerConfig::default(),
            target: String::new(),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// A breaker that opens after `max_failures` consecutive failures,
    /// rolling its closed-state counters every hour.
    pub fn consecutive_failures(max_failures: u64) -> Self {
        Self::new()
            .strategy(Strategy::consecutive_failures(max_failures))
            .closed_window(DEFAULT_CONSECUTIVE_FAILURES_WINDOW)
    }

    /// A breaker that opens once `ratio` of at least `min_requests` requests
    /// failed, rolling its closed-state counters every 200ms.
    pub fn failure_ratio(min_requests: u64, ratio: f64) -> Self {
        Self::new()
            .strategy(Strategy::failure_ratio(min_requests, ratio))
            .closed_window(DEFAULT_FAILURE_RATIO_WINDOW)
    }

    /// Starts from an existing configuration.
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of probes admitted while half-open.
    pub fn max_probes(mut self, max_probes: u32) -> Self {
        self.config.max_probes = max_probes;
        self
    }

    /// Sets the closed-state counting window; zero disables rollover.
    pub fn closed_window(mut self, window: Duration) -> Self {
        self.config.closed_window = window;
        self
    }

    /// Sets how long the breaker stays open before probing.
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    /// Sets the open strategy.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Sets the target id used to tag observability events.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Shares a metric sink between several breakers.
    pub fn shared_metric_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.metric_sink = sink;
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Sets the time source.
    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Builds the breaker, substituting defaults for invalid settings.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(
            self.config.normalized(),
            self.target,
            self.metric_sink,
            self.hook_registry,
            self.clock,
        )
    }
}
