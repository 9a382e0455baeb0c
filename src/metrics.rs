//! Observability events and the sinks that receive them.

use crate::error::AllowError;
use crate::state::State;

/// Tag key carrying the breaker's target id on every recorded event.
pub const TARGET_TAG: &str = "target_id";

/// Something observable the breaker did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// An attempt was admitted in the given state (`Closed` or `HalfOpen`).
    Admitted(State),

    /// An attempt was refused.
    Rejected(AllowError),

    /// An attempt reported success.
    Succeeded,

    /// An attempt reported failure.
    Failed,

    /// The breaker changed state.
    Transition {
        /// State that was left.
        from: State,
        /// State that was entered.
        to: State,
        /// Position of this transition in the breaker's history, starting
        /// at 1.
        sequence: u64,
    },
}

impl Event {
    /// Stable metric name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Admitted(State::HalfOpen) => "circuit_breaker.throughput.half_open.allowed",
            Event::Admitted(_) => "circuit_breaker.throughput.close.allowed",
            Event::Rejected(AllowError::OpenState) => "circuit_breaker.throughput.open.avoided",
            Event::Rejected(AllowError::TooManyRequests) => {
                "circuit_breaker.throughput.half_open.avoided"
            }
            Event::Succeeded => "circuit_breaker.result.success",
            Event::Failed => "circuit_breaker.result.failure",
            Event::Transition { to, .. } => match to {
                State::Closed => "circuit_breaker.change_state.closed",
                State::Open => "circuit_breaker.change_state.open",
                State::HalfOpen => "circuit_breaker.change_state.half-open",
            },
        }
    }
}

/// Receives named events from circuit breakers.
///
/// Calls are fire-and-forget. They happen after the breaker's lock has been
/// released; a panicking sink is contained and logged. Events produced by
/// one call arrive in order, but events from calls racing on other threads
/// may interleave in any order; use the sequence of
/// [`Event::Transition`] (see [`HookRegistry::set_on_transition`]) when the
/// order of state changes matters.
///
/// [`HookRegistry::set_on_transition`]: crate::HookRegistry::set_on_transition
pub trait MetricSink: Send + Sync + 'static {
    /// Records `value` occurrences of the event `name`.
    fn record(&self, name: &str, value: u64, tags: &[(&str, &str)]);
}

/// A null metrics sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record(&self, _name: &str, _value: u64, _tags: &[(&str, &str)]) {}
}

/// Forwards every event to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricSink;

impl MetricSink for TracingMetricSink {
    fn record(&self, name: &str, value: u64, tags: &[(&str, &str)]) {
        let target = tags
            .iter()
            .find(|(key, _)| *key == TARGET_TAG)
            .map(|(_, v)| *v)
            .unwrap_or_default();
        tracing::debug!(metric = name, value, target_id = target, "circuit breaker event");
    }
}

#[cfg(feature = "prometheus")]
pub use self::prometheus_sink::PrometheusMetricSink;

#[cfg(feature = "prometheus")]
mod prometheus_sink {
    use super::MetricSink;
    use prometheus_client::metrics::counter::Counter;
    use prometheus_client::metrics::family::Family;
    use prometheus_client::registry::Registry;

    type Labels = Vec<(String, String)>;

    /// Counts events in a `prometheus-client` counter family labelled by
    /// event name and tags.
    #[derive(Debug, Clone, Default)]
    pub struct PrometheusMetricSink {
        events: Family<Labels, Counter>,
    }

    impl PrometheusMetricSink {
        /// Creates the sink and registers its counter family.
        pub fn new(registry: &mut Registry) -> Self {
            let sink = Self::default();
            registry.register(
                "circuit_breaker_events",
                "Circuit breaker admissions, outcomes and state changes",
                sink.events.clone(),
            );
            sink
        }
    }

    impl MetricSink for PrometheusMetricSink {
        fn record(&self, name: &str, value: u64, tags: &[(&str, &str)]) {
            let mut labels = Labels::with_capacity(tags.len() + 1);
            labels.push(("event".to_owned(), name.to_owned()));
            labels.extend(tags.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));
            self.events.get_or_create(&labels).inc_by(value);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use prometheus_client::encoding::text::encode;

        #[test]
        fn counts_events_per_label_set() {
            let mut registry = Registry::default();
            let sink = PrometheusMetricSink::new(&mut registry);

            sink.record("circuit_breaker.result.failure", 1, &[("target_id", "users")]);
            sink.record("circuit_breaker.result.failure", 1, &[("target_id", "users")]);

            let mut out = String::new();
            encode(&mut out, &registry).expect("encoding succeeds");
            assert!(out.contains("circuit_breaker_events_total"));
            assert!(out.contains("target_id=\"users\""));
            assert!(out.contains("} 2"));
        }
    }
}
