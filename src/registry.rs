//! Per-target breaker lookup owned by the application.

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::breaker::CircuitBreaker;

/// Breakers keyed by the logical target they protect.
///
/// Build one at startup and pass it to whatever issues calls; the crate
/// keeps no global breaker state of its own.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: RwLock<AHashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `breaker` under `target`, tagging it with that id.
    /// Returns the breaker previously registered there.
    pub fn insert(&self, target: impl Into<String>, breaker: CircuitBreaker) -> Option<CircuitBreaker> {
        let target = target.into();
        breaker.set_target(target.clone());
        self.breakers.write().insert(target, breaker)
    }

    /// Looks up the breaker for `target`.
    pub fn get(&self, target: &str) -> Option<CircuitBreaker> {
        self.breakers.read().get(target).cloned()
    }

    /// Returns the breaker for `target`, building it with `make` on first use.
    ///
    /// `make` runs without any registry lock held, so it may use the
    /// registry. If another caller registers `target` first, the breaker
    /// built here is discarded and the registered one is returned.
    pub fn get_or_insert_with<F>(&self, target: &str, make: F) -> CircuitBreaker
    where
        F: FnOnce() -> CircuitBreaker,
    {
        if let Some(breaker) = self.get(target) {
            return breaker;
        }

        let built = make();

        let mut breakers = self.breakers.write();
        if let Some(existing) = breakers.get(target) {
            return existing.clone();
        }
        built.set_target(target);
        breakers.insert(target.to_owned(), built.clone());
        drop(breakers);

        tracing::debug!(target_id = target, "registered circuit breaker");
        built
    }

    /// Removes and returns the breaker for `target`.
    pub fn remove(&self, target: &str) -> Option<CircuitBreaker> {
        self.breakers.write().remove(target)
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// Returns true if no breaker is registered.
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Registered target ids, in no particular order.
    pub fn targets(&self) -> Vec<String> {
        self.breakers.read().keys().cloned().collect()
    }
}
