//! Interceptors that run around every dispatch.
//!
//! A [`Middleware`] may rewrite or tag an action in its `before` hook and
//! perform side effects (logging, timing, autosave scheduling) in its
//! `after` hook. Hooks never mutate the snapshot and never block on async
//! work: anything asynchronous is expressed as a separately dispatched
//! action later.
//!
//! A failing or panicking hook is logged and skipped. The dispatch carries
//! on with the unmodified action, so only that hook's effect is lost.

pub mod builtin;

use std::panic::{AssertUnwindSafe, catch_unwind};

use stargazer_types::{Action, Snapshot};
use tracing::warn;

pub use builtin::{
    ActionLog, AutosaveSignal, AutosaveTrigger, DispatchTiming, PayloadGuard, PersistRequest,
    PersistRequestRelay, PersistRequests, SequenceStamp, TimingHandle, TimingStats,
};

/// Errors a middleware hook may report.
#[derive(Debug, thiserror::Error)]
pub enum MiddlewareError {
    /// The hook ran but could not do its job.
    #[error("middleware {middleware} failed: {reason}")]
    Failed {
        /// Name of the failing middleware.
        middleware: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// The hook panicked.
    #[error("middleware {middleware} panicked in {hook} hook")]
    Panicked {
        /// Name of the failing middleware.
        middleware: &'static str,
        /// `before` or `after`.
        hook: &'static str,
    },
}

/// An interceptor around dispatch.
///
/// Both hooks have no-op defaults, so implementors override only what they
/// need.
pub trait Middleware: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Runs before the reducer. Return `Some` to replace the action.
    fn before(
        &mut self,
        _action: &Action,
        _snapshot: &Snapshot,
    ) -> Result<Option<Action>, MiddlewareError> {
        Ok(None)
    }

    /// Runs after subscribers have been notified.
    fn after(
        &mut self,
        _action: &Action,
        _previous: &Snapshot,
        _next: &Snapshot,
    ) -> Result<(), MiddlewareError> {
        Ok(())
    }
}

/// Ordered list of middleware, run in registration order.
#[derive(Default)]
pub struct MiddlewareChain {
    entries: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware to the end of the chain.
    pub fn push(&mut self, middleware: Box<dyn Middleware>) {
        self.entries.push(middleware);
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name()).collect()
    }

    /// Run every `before` hook, threading the (possibly rewritten) action
    /// through the chain.
    pub fn run_before(&mut self, mut action: Action, snapshot: &Snapshot) -> Action {
        for entry in &mut self.entries {
            let name = entry.name();
            let outcome = catch_unwind(AssertUnwindSafe(|| entry.before(&action, snapshot)))
                .unwrap_or(Err(MiddlewareError::Panicked {
                    middleware: name,
                    hook: "before",
                }));
            match outcome {
                Ok(Some(rewritten)) => action = rewritten,
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        middleware = name,
                        action_type = %action.action_type(),
                        error = %error,
                        "Middleware before hook failed, skipping"
                    );
                }
            }
        }
        action
    }

    /// Run every `after` hook.
    pub fn run_after(&mut self, action: &Action, previous: &Snapshot, next: &Snapshot) {
        for entry in &mut self.entries {
            let name = entry.name();
            let outcome = catch_unwind(AssertUnwindSafe(|| entry.after(action, previous, next)))
                .unwrap_or(Err(MiddlewareError::Panicked {
                    middleware: name,
                    hook: "after",
                }));
            if let Err(error) = outcome {
                warn!(
                    middleware = name,
                    action_type = %action.action_type(),
                    error = %error,
                    "Middleware after hook failed, skipping"
                );
            }
        }
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("entries", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use stargazer_types::{ActionSource, LevelId, creators};

    use super::*;

    struct Tagger;

    impl Middleware for Tagger {
        fn name(&self) -> &'static str {
            "tagger"
        }

        fn before(
            &mut self,
            action: &Action,
            _snapshot: &Snapshot,
        ) -> Result<Option<Action>, MiddlewareError> {
            Ok(Some(action.clone().with_tag("tagged", "yes")))
        }
    }

    struct Exploding;

    impl Middleware for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn before(
            &mut self,
            _action: &Action,
            _snapshot: &Snapshot,
        ) -> Result<Option<Action>, MiddlewareError> {
            panic!("boom");
        }

        fn after(
            &mut self,
            _action: &Action,
            _previous: &Snapshot,
            _next: &Snapshot,
        ) -> Result<(), MiddlewareError> {
            Err(MiddlewareError::Failed {
                middleware: "exploding",
                reason: "always".to_owned(),
            })
        }
    }

    #[test]
    fn failing_hooks_do_not_stop_the_chain() {
        let mut chain = MiddlewareChain::new();
        chain.push(Box::new(Exploding));
        chain.push(Box::new(Tagger));
        assert_eq!(chain.names(), vec!["exploding", "tagger"]);

        let snapshot = Snapshot::fresh(LevelId::new("observatory"));
        let action = chain.run_before(creators::star_deselected(), &snapshot);
        assert_eq!(action.meta.tag("tagged"), Some("yes"));
        assert_eq!(action.meta.source, ActionSource::Ui);

        chain.run_after(&action, &snapshot, &snapshot);
    }
}
