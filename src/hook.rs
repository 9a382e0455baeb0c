//! Hook registry for circuit breaker events.

use crate::error::AllowError;
use crate::metrics::Event;
use crate::state::State;
use parking_lot::RwLock;
use std::sync::Arc;

type HookFn = Arc<dyn Fn(&str) + Send + Sync + 'static>;
type RejectHookFn = Arc<dyn Fn(&str, AllowError) + Send + Sync + 'static>;
type TransitionHookFn = Arc<dyn Fn(&str, State, State, u64) + Send + Sync + 'static>;

/// A registry of callbacks invoked on breaker events.
///
/// Every hook receives the breaker's target id. Hooks run after the
/// breaker's lock is released, so they may call back into the breaker.
///
/// Hooks fired by operations racing on different threads can run out of
/// order: `on_open` for a later transition may run before `on_close` for an
/// earlier one. The transition hook receives the transition's sequence
/// number so listeners can discard changes older than the last one seen.
#[derive(Default)]
pub struct HookRegistry {
    on_open: RwLock<Option<HookFn>>,
    on_close: RwLock<Option<HookFn>>,
    on_half_open: RwLock<Option<HookFn>>,
    on_success: RwLock<Option<HookFn>>,
    on_failure: RwLock<Option<HookFn>>,
    on_rejected: RwLock<Option<RejectHookFn>>,
    on_transition: RwLock<Option<TransitionHookFn>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("on_open", &self.on_open.read().is_some())
            .field("on_close", &self.on_close.read().is_some())
            .field("on_half_open", &self.on_half_open.read().is_some())
            .field("on_success", &self.on_success.read().is_some())
            .field("on_failure", &self.on_failure.read().is_some())
            .field("on_rejected", &self.on_rejected.read().is_some())
            .field("on_transition", &self.on_transition.read().is_some())
            .finish()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook to call when the circuit breaker opens.
    pub fn set_on_open<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_open.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit breaker closes.
    pub fn set_on_close<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_close.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when the circuit breaker half-opens.
    pub fn set_on_half_open<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_half_open.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when an attempt reports success.
    pub fn set_on_success<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_success.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when an attempt reports failure.
    pub fn set_on_failure<F>(&self, f: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.on_failure.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call when an attempt is refused.
    pub fn set_on_rejected<F>(&self, f: F)
    where
        F: Fn(&str, AllowError) + Send + Sync + 'static,
    {
        *self.on_rejected.write() = Some(Arc::new(f));
    }

    /// Sets the hook to call on every state change with the state left, the
    /// state entered and the transition's sequence number.
    pub fn set_on_transition<F>(&self, f: F)
    where
        F: Fn(&str, State, State, u64) + Send + Sync + 'static,
    {
        *self.on_transition.write() = Some(Arc::new(f));
    }

    /// Runs the hook matching `event`, if one is set.
    pub(crate) fn dispatch(&self, event: Event, target: &str) {
        let slot = match event {
            Event::Admitted(_) => return,
            Event::Rejected(reason) => {
                // Clone out so the hook runs without the read guard held.
                let hook = self.on_rejected.read().clone();
                if let Some(hook) = hook {
                    hook(target, reason);
                }
                return;
            }
            Event::Succeeded => &self.on_success,
            Event::Failed => &self.on_failure,
            Event::Transition { from, to, sequence } => {
                let hook = self.on_transition.read().clone();
                if let Some(hook) = hook {
                    hook(target, from, to, sequence);
                }
                match to {
                    State::Open => &self.on_open,
                    State::Closed => &self.on_close,
                    State::HalfOpen => &self.on_half_open,
                }
            }
        };

        let hook = slot.read().clone();
        if let Some(hook) = hook {
            hook(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatches_transition_to_matching_hook() {
        let hooks = HookRegistry::new();
        let opened = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicUsize::new(0));

        let o = Arc::clone(&opened);
        hooks.set_on_open(move |target| {
            assert_eq!(target, "billing");
            o.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&closed);
        hooks.set_on_close(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        hooks.dispatch(
            Event::Transition {
                from: State::Closed,
                to: State::Open,
                sequence: 1,
            },
            "billing",
        );
        hooks.dispatch(Event::Succeeded, "billing");

        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transition_hook_sees_both_states_and_sequence() {
        let hooks = HookRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let opened = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&seen);
        hooks.set_on_transition(move |target, from, to, sequence| {
            s.lock().push((target.to_owned(), from, to, sequence));
        });
        let o = Arc::clone(&opened);
        hooks.set_on_open(move |_| {
            o.fetch_add(1, Ordering::SeqCst);
        });

        hooks.dispatch(
            Event::Transition {
                from: State::HalfOpen,
                to: State::Open,
                sequence: 7,
            },
            "ledger",
        );
        hooks.dispatch(Event::Failed, "ledger");

        assert_eq!(
            *seen.lock(),
            vec![("ledger".to_owned(), State::HalfOpen, State::Open, 7)]
        );
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejected_hook_sees_reason() {
        let hooks = HookRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        hooks.set_on_rejected(move |_, reason| s.lock().push(reason));

        hooks.dispatch(Event::Rejected(AllowError::OpenState), "t");
        hooks.dispatch(Event::Rejected(AllowError::TooManyRequests), "t");

        assert_eq!(
            *seen.lock(),
            vec![AllowError::OpenState, AllowError::TooManyRequests]
        );
    }
}
