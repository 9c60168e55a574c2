//! Middleware hooks around every action run
//!
//! Middleware sees each action a dispatch runs, cascaded listeners included:
//! `before` right before the handler is invoked, `after` once the action has
//! committed or failed. Hooks run synchronously inside the dispatch, so a
//! middleware observes the exact commit order.

use crate::action::ActionId;
use crate::dispatch::{DispatchRecord, RecordResult};
use crate::value::Value;

/// Middleware trait for intercepting action runs
///
/// Implement this trait to add logging, auditing, or other cross-cutting
/// concerns to a store.
pub trait Middleware {
    /// Called before the action's handler runs
    fn before(&mut self, action: &ActionId, payload: &Value, depth: usize);

    /// Called after the action committed or failed
    fn after(&mut self, record: &DispatchRecord<'_>);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {
    fn before(&mut self, _action: &ActionId, _payload: &Value, _depth: usize) {}
    fn after(&mut self, _record: &DispatchRecord<'_>) {}
}

/// Middleware that logs actions (for debugging)
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before the handler runs
    pub log_before: bool,
    /// Whether to log after the action settles
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Create a logging middleware that logs both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&mut self, action: &ActionId, _payload: &Value, depth: usize) {
        if self.log_before {
            tracing::debug!(action = %action, depth, "Running action");
        }
    }

    fn after(&mut self, record: &DispatchRecord<'_>) {
        if !self.log_after {
            return;
        }
        match record.result {
            RecordResult::Committed { changed, .. } => {
                tracing::debug!(
                    action = %record.action,
                    depth = record.depth,
                    state_changed = changed,
                    "Action committed"
                );
            }
            RecordResult::Failed(err) => {
                tracing::debug!(
                    action = %record.action,
                    depth = record.depth,
                    error = %err,
                    "Action failed"
                );
            }
        }
    }
}

/// Compose multiple middleware into a single middleware
pub struct ComposedMiddleware {
    middlewares: Vec<Box<dyn Middleware + Send>>,
}

impl std::fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl Default for ComposedMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposedMiddleware {
    /// Create a new composed middleware
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware + Send + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Builder-style [`add`](Self::add)
    pub fn with<M: Middleware + Send + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&mut self, action: &ActionId, payload: &Value, depth: usize) {
        for middleware in &mut self.middlewares {
            middleware.before(action, payload, depth);
        }
    }

    fn after(&mut self, record: &DispatchRecord<'_>) {
        // Call in reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Trace {
        events: Arc<Mutex<Vec<String>>>,
    }

    struct Tagged {
        tag: &'static str,
        trace: Trace,
    }

    impl Middleware for Tagged {
        fn before(&mut self, action: &ActionId, _payload: &Value, _depth: usize) {
            self.trace
                .events
                .lock()
                .push(format!("{}:before:{}", self.tag, action));
        }

        fn after(&mut self, record: &DispatchRecord<'_>) {
            self.trace
                .events
                .lock()
                .push(format!("{}:after:{}", self.tag, record.action));
        }
    }

    #[test]
    fn test_composed_middleware_nests() {
        let trace = Trace::default();
        let mut composed = ComposedMiddleware::new()
            .with(Tagged {
                tag: "outer",
                trace: trace.clone(),
            })
            .with(Tagged {
                tag: "inner",
                trace: trace.clone(),
            });
        assert_eq!(composed.len(), 2);

        let id = ActionId::from("t");
        let payload = Value::Null;
        let next = Value::Null;
        composed.before(&id, &payload, 0);
        composed.after(&DispatchRecord {
            action: &id,
            payload: &payload,
            depth: 0,
            prior: None,
            result: RecordResult::Committed {
                next: &next,
                changed: false,
            },
        });

        let events = trace.events.lock().clone();
        assert_eq!(
            events,
            vec![
                "outer:before:t",
                "inner:before:t",
                "inner:after:t",
                "outer:after:t",
            ]
        );
    }
}
