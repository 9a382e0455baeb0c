//! Outcome accounting for the current observation window.

/// Request and outcome counters of a single window.
///
/// The counters are cleared on every window rollover and every state
/// transition. While attempts are in flight `requests` runs ahead of
/// `total_successes + total_failures`; the two agree once every admitted
/// attempt of the window has reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    requests: u64,
    total_successes: u64,
    total_failures: u64,
    consecutive_successes: u64,
    consecutive_failures: u64,
}

impl Counts {
    /// Creates an empty counter.
    pub const fn new() -> Self {
        Self {
            requests: 0,
            total_successes: 0,
            total_failures: 0,
            consecutive_successes: 0,
            consecutive_failures: 0,
        }
    }

    /// Number of admitted requests.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Number of reported successes.
    pub fn total_successes(&self) -> u64 {
        self.total_successes
    }

    /// Number of reported failures.
    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Length of the current run of successes.
    pub fn consecutive_successes(&self) -> u64 {
        self.consecutive_successes
    }

    /// Length of the current run of failures.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures
    }

    /// Failures over admitted requests, `0.0` for an empty window.
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }

        self.total_failures as f64 / self.requests as f64
    }

    pub(crate) fn on_request(&mut self) {
        self.requests += 1;
    }

    pub(crate) fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.check();
    }

    pub(crate) fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.check();
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::new();
    }

    // Outcomes are only recorded for admitted requests of the same window.
    fn check(&self) {
        debug_assert!(
            self.total_successes + self.total_failures <= self.requests,
            "more outcomes than requests: {:?}",
            self
        );
        debug_assert!(self.consecutive_successes <= self.total_successes);
        debug_assert!(self.consecutive_failures <= self.total_failures);
    }
}
