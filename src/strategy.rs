//! Open strategies: the rules deciding when a closed breaker trips.

use crate::counts::Counts;

/// Consecutive failures used when a threshold of zero is configured.
pub const DEFAULT_MAX_FAILURES: u64 = 50;

/// Minimum sample size used when zero is configured.
pub const DEFAULT_MIN_REQUESTS: u64 = 50;

/// Failure ratio used when the configured one is out of range.
pub const DEFAULT_RATIO: f64 = 0.2;

/// Decides whether a closed breaker should open.
///
/// A strategy is evaluated only after a failure has been recorded while the
/// breaker is closed. Failures while half-open always re-open the breaker,
/// regardless of the strategy.
///
/// # The `Never` strategy
///
/// [`Strategy::Never`] is the default and **never opens from the closed
/// state**. A breaker built with it only ever leaves `Closed` if it is
/// already cycling through `HalfOpen`, which in practice means it never
/// opens at all. It exists for breakers meant to be tripped exclusively by
/// half-open probe failures; pick [`Strategy::ConsecutiveFailures`] or
/// [`Strategy::FailureRatio`] for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Strategy {
    /// Never opens from the closed state.
    #[default]
    Never,

    /// Opens once `consecutive_failures >= threshold`.
    ConsecutiveFailures {
        /// Length of the failure run that trips the breaker.
        threshold: u64,
    },

    /// Opens once `requests >= min_samples` and
    /// `total_failures / requests >= ratio`.
    FailureRatio {
        /// Requests required in the window before the ratio is considered.
        min_samples: u64,
        /// Failure ratio in `(0, 1]` that trips the breaker.
        ratio: f64,
    },
}

impl Strategy {
    /// Trips after `threshold` failures in a row.
    pub fn consecutive_failures(threshold: u64) -> Self {
        Strategy::ConsecutiveFailures { threshold }
    }

    /// Trips when at least `ratio` of at least `min_samples` requests failed.
    pub fn failure_ratio(min_samples: u64, ratio: f64) -> Self {
        Strategy::FailureRatio { min_samples, ratio }
    }

    /// Evaluates the strategy against the current window.
    pub fn should_open(&self, counts: &Counts) -> bool {
        match *self {
            Strategy::Never => false,
            Strategy::ConsecutiveFailures { threshold } => {
                counts.consecutive_failures() >= threshold
            }
            Strategy::FailureRatio { min_samples, ratio } => {
                counts.requests() > 0
                    && counts.requests() >= min_samples
                    && counts.failure_ratio() >= ratio
            }
        }
    }

    /// Replaces zero or out-of-range parameters with the documented defaults.
    pub fn normalized(self) -> Self {
        match self {
            Strategy::Never => Strategy::Never,
            Strategy::ConsecutiveFailures { threshold } => {
                let threshold = if threshold == 0 {
                    tracing::warn!(
                        default = DEFAULT_MAX_FAILURES,
                        "zero consecutive failure threshold, using default"
                    );
                    DEFAULT_MAX_FAILURES
                } else {
                    threshold
                };
                Strategy::ConsecutiveFailures { threshold }
            }
            Strategy::FailureRatio { min_samples, ratio } => {
                let min_samples = if min_samples == 0 {
                    tracing::warn!(
                        default = DEFAULT_MIN_REQUESTS,
                        "zero failure ratio sample size, using default"
                    );
                    DEFAULT_MIN_REQUESTS
                } else {
                    min_samples
                };
                let ratio = if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
                    ratio
                } else {
                    tracing::warn!(ratio, default = DEFAULT_RATIO, "invalid failure ratio, using default");
                    DEFAULT_RATIO
                };
                Strategy::FailureRatio { min_samples, ratio }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(requests: u64, outcomes: &[bool]) -> Counts {
        let mut counts = Counts::new();
        for _ in 0..requests {
            counts.on_request();
        }
        for &ok in outcomes {
            if ok {
                counts.on_success();
            } else {
                counts.on_failure();
            }
        }
        counts
    }

    #[test]
    fn never_ignores_every_failure() {
        let counts = window(100, &[false; 100]);
        assert!(!Strategy::Never.should_open(&counts));
        assert_eq!(Strategy::default(), Strategy::Never);
    }

    #[test]
    fn consecutive_failures_needs_an_unbroken_run() {
        let strategy = Strategy::consecutive_failures(3);

        assert!(!strategy.should_open(&window(3, &[false, false])));
        assert!(!strategy.should_open(&window(4, &[false, false, true, false])));
        assert!(strategy.should_open(&window(3, &[false, false, false])));
    }

    #[test]
    fn failure_ratio_respects_sample_floor() {
        let strategy = Strategy::failure_ratio(10, 0.5);

        let mut outcomes = vec![true; 5];
        outcomes.extend([false; 4]);
        assert!(!strategy.should_open(&window(10, &outcomes)));
        outcomes.push(false);
        assert!(strategy.should_open(&window(10, &outcomes)));

        // 8 of 9 failed, but the floor of 10 samples is not met.
        let mut outcomes = vec![false; 8];
        outcomes.push(true);
        assert!(!strategy.should_open(&window(9, &outcomes)));
    }

    #[test]
    fn failure_ratio_on_empty_window_stays_closed() {
        let strategy = Strategy::FailureRatio {
            min_samples: 0,
            ratio: 0.0,
        };
        assert!(!strategy.should_open(&Counts::new()));
    }

    #[test]
    fn normalization_replaces_invalid_parameters() {
        assert_eq!(
            Strategy::consecutive_failures(0).normalized(),
            Strategy::consecutive_failures(DEFAULT_MAX_FAILURES)
        );
        assert_eq!(
            Strategy::failure_ratio(0, f64::NAN).normalized(),
            Strategy::failure_ratio(DEFAULT_MIN_REQUESTS, DEFAULT_RATIO)
        );
        assert_eq!(
            Strategy::failure_ratio(5, 1.5).normalized(),
            Strategy::failure_ratio(5, DEFAULT_RATIO)
        );
        assert_eq!(
            Strategy::failure_ratio(5, 1.0).normalized(),
            Strategy::failure_ratio(5, 1.0)
        );
    }
}
