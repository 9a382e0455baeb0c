//! # gatekeeper-rs
//!
//! A circuit breaker that stops callers from hammering an operation that is
//! likely to fail, and lets a bounded number of trial calls through once a
//! cooldown has passed.
//!
//! ## States
//!
//! - **Closed**: calls pass through. Outcomes are counted in a window that
//!   optionally rolls over on a fixed period. When a failure makes the
//!   configured [`Strategy`] true, the breaker opens.
//! - **Open**: every call is refused with [`AllowError::OpenState`] until the
//!   open timeout has elapsed.
//! - **Half-Open**: up to `max_probes` trial calls are admitted; further calls
//!   get [`AllowError::TooManyRequests`]. A single failure re-opens the
//!   breaker, `max_probes` successes in a row close it.
//!
//! Transitions are evaluated lazily whenever the breaker is consulted; there
//! are no background timers.
//!
//! ## Generations
//!
//! Every window rollover and every transition starts a new generation. An
//! admitted attempt carries the generation it was admitted under in its
//! [`Permit`], and its outcome is dropped if the generation has moved on, so
//! a slow call can never pollute the statistics of a newer window.
//!
//! ## Basic Usage
//!
//! ```rust
//! use gatekeeper_rs::{AllowError, CircuitBreaker, Strategy};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .target("inventory-service")
//!     .strategy(Strategy::consecutive_failures(3))
//!     .open_timeout(Duration::from_secs(30))
//!     .max_probes(5)
//!     .build();
//!
//! match breaker.allow() {
//!     Ok(permit) => {
//!         // Perform the guarded call, then report how it went.
//!         let ok = true;
//!         permit.report(ok);
//!     }
//!     Err(AllowError::OpenState) => println!("circuit is open, using fallback"),
//!     Err(AllowError::TooManyRequests) => println!("recovery probes exhausted"),
//! }
//! ```
//!
//! Or let the breaker run a closure and classify its result:
//!
//! ```rust
//! use gatekeeper_rs::{BreakerBuilder, BreakerError};
//!
//! let breaker = BreakerBuilder::failure_ratio(20, 0.5).build();
//!
//! match breaker.call(|| "42".parse::<u32>()) {
//!     Ok(value) => println!("got {}", value),
//!     Err(BreakerError::Rejected(reason)) => println!("refused: {}", reason),
//!     Err(err) => println!("call failed: {}", err),
//! }
//! ```
//!
//! ## Features
//!
//! - `async` - `call_async` and `call_async_timeout` on Tokio
//! - `prometheus` - [`PrometheusMetricSink`] backed by `prometheus-client`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod clock;
mod config;
mod counts;
mod error;
mod hook;
mod metrics;
pub mod prelude;
mod registry;
mod state;
mod strategy;

// Re-exports
pub use breaker::{CircuitBreaker, Permit};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    BreakerBuilder, BreakerConfig, DEFAULT_CONSECUTIVE_FAILURES_WINDOW,
    DEFAULT_FAILURE_RATIO_WINDOW, DEFAULT_MAX_PROBES, DEFAULT_OPEN_TIMEOUT,
};
pub use counts::Counts;
pub use error::{AllowError, BreakerError, BreakerResult};
pub use hook::HookRegistry;
#[cfg(feature = "prometheus")]
pub use metrics::PrometheusMetricSink;
pub use metrics::{Event, MetricSink, NullMetricSink, TracingMetricSink, TARGET_TAG};
pub use registry::BreakerRegistry;
pub use state::State;
pub use strategy::{Strategy, DEFAULT_MAX_FAILURES, DEFAULT_MIN_REQUESTS, DEFAULT_RATIO};
