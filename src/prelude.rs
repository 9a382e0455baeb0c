//! Re-exports the types most callers need.
//!
//! # Example
//! ```rust,no_run
//! use gatekeeper_rs::prelude::*;
//!
//! let breaker = BreakerBuilder::consecutive_failures(5).build();
//! assert_eq!(breaker.state(), State::Closed);
//! ```

pub use crate::breaker::{CircuitBreaker, Permit};
pub use crate::config::BreakerBuilder;
pub use crate::error::{AllowError, BreakerError, BreakerResult};
pub use crate::state::State;
pub use crate::strategy::Strategy;
