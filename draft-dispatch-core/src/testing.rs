//! Test utilities for draft-dispatch stores
//!
//! - [`StoreHarness`]: a store wired to record every action run and every
//!   published snapshot
//! - Assertion macros for verifying which actions fired
//!
//! # Example
//!
//! ```
//! use draft_dispatch_core::testing::StoreHarness;
//! use draft_dispatch_core::{action, assert_fired, assert_not_fired, Model};
//! use serde_json::json;
//!
//! let model = Model::new()
//!     .state("items", json!([]))
//!     .action("add", action(|draft, payload| {
//!         draft.field("items")?.push(payload.clone())?;
//!         Ok(None)
//!     }))
//!     .action("audit", action(|_, _| Ok(None)).listen_to("add"));
//!
//! let mut harness = StoreHarness::new(model);
//! harness.dispatch("add", "milk").unwrap();
//!
//! let fired = harness.drain_fired();
//! assert_fired!(fired, "add", "milk");
//! assert_fired!(fired, "audit");
//! assert_not_fired!(fired, "remove");
//! assert_eq!(harness.drain_published().len(), 1);
//! ```

use tokio::sync::mpsc;

use crate::action::ActionId;
use crate::config::StoreConfig;
use crate::dispatch::{DispatchOutcome, DispatchRecord, RecordResult};
use crate::error::{DefinitionError, DispatchError};
use crate::middleware::Middleware;
use crate::model::Model;
use crate::store::{Store, Subscription};
use crate::value::Value;

/// One action run as seen by [`RecordingMiddleware`].
#[derive(Debug, Clone, PartialEq)]
pub struct FiredAction {
    pub action: ActionId,
    pub payload: Value,
    pub depth: usize,
    /// Whether the action committed (as opposed to failing).
    pub committed: bool,
    pub changed: bool,
    pub error: Option<String>,
}

/// Middleware that forwards every settled action run to a channel.
#[derive(Debug, Clone)]
pub struct RecordingMiddleware {
    tx: mpsc::UnboundedSender<FiredAction>,
}

impl RecordingMiddleware {
    pub fn new(tx: mpsc::UnboundedSender<FiredAction>) -> Self {
        Self { tx }
    }
}

impl Middleware for RecordingMiddleware {
    fn before(&mut self, _action: &ActionId, _payload: &Value, _depth: usize) {}

    fn after(&mut self, record: &DispatchRecord<'_>) {
        let error = match record.result {
            RecordResult::Failed(err) => Some(err.to_string()),
            RecordResult::Committed { .. } => None,
        };
        let _ = self.tx.send(FiredAction {
            action: record.action.clone(),
            payload: record.payload.clone(),
            depth: record.depth,
            committed: record.succeeded(),
            changed: record.changed(),
            error,
        });
    }
}

/// Test harness around a [`Store`].
///
/// Records every action run (cascaded listeners included) and every published
/// snapshot, for draining after a dispatch.
pub struct StoreHarness {
    /// The store under test
    pub store: Store<RecordingMiddleware>,
    fired_rx: mpsc::UnboundedReceiver<FiredAction>,
    published_rx: mpsc::UnboundedReceiver<Value>,
    _published: Subscription,
}

impl StoreHarness {
    /// Bind `model` into a recording store.
    ///
    /// # Panics
    ///
    /// Panics if the model does not bind.
    pub fn new(model: Model) -> Self {
        Self::try_new(model).unwrap_or_else(|err| panic!("model failed to bind: {err}"))
    }

    pub fn try_new(model: Model) -> Result<Self, DefinitionError> {
        Self::with_config(model, StoreConfig::new("harness"))
    }

    pub fn with_config(model: Model, config: StoreConfig) -> Result<Self, DefinitionError> {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let (published_tx, published_rx) = mpsc::unbounded_channel();

        let store = Store::with_middleware(model, config, RecordingMiddleware::new(fired_tx))?;
        let published = store.subscribe(move |snapshot| {
            let _ = published_tx.send(snapshot.clone());
        });

        Ok(Self {
            store,
            fired_rx,
            published_rx,
            _published: published,
        })
    }

    pub fn dispatch(
        &self,
        action: &str,
        payload: impl Into<Value>,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.store.dispatch(action, payload)
    }

    pub fn snapshot(&self) -> Value {
        self.store.snapshot()
    }

    pub fn select(&self, path: &[&str]) -> Option<Value> {
        self.store.select(path)
    }

    /// Drain every recorded action run, in the order they settled.
    pub fn drain_fired(&mut self) -> Vec<FiredAction> {
        let mut fired = Vec::new();
        while let Ok(action) = self.fired_rx.try_recv() {
            fired.push(action);
        }
        fired
    }

    /// Drain every published snapshot.
    pub fn drain_published(&mut self) -> Vec<Value> {
        let mut published = Vec::new();
        while let Ok(snapshot) = self.published_rx.try_recv() {
            published.push(snapshot);
        }
        published
    }

    pub fn has_published(&mut self) -> bool {
        !self.drain_published().is_empty()
    }
}

/// Assert that an action committed, optionally with a given payload.
///
/// ```ignore
/// let fired = harness.drain_fired();
/// assert_fired!(fired, "todos.add");
/// assert_fired!(fired, "todos.add", "buy milk");
/// ```
#[macro_export]
macro_rules! assert_fired {
    ($fired:expr, $action:expr) => {
        assert!(
            $fired.iter().any(|f| f.committed && f.action == $action),
            "Expected `{}` to fire, but got: {:?}",
            $action,
            $fired.iter().map(|f| f.action.as_str()).collect::<Vec<_>>()
        );
    };
    ($fired:expr, $action:expr, $payload:expr) => {{
        let payload = $crate::Value::from($payload);
        assert!(
            $fired
                .iter()
                .any(|f| f.committed && f.action == $action && f.payload == payload),
            "Expected `{}` to fire with {}, but got: {:?}",
            $action,
            payload,
            $fired
                .iter()
                .map(|f| format!("{}({})", f.action, f.payload))
                .collect::<Vec<_>>()
        );
    }};
}

/// Assert that an action did NOT commit.
#[macro_export]
macro_rules! assert_not_fired {
    ($fired:expr, $action:expr) => {
        assert!(
            !$fired.iter().any(|f| f.committed && f.action == $action),
            "Expected `{}` NOT to fire, but it did",
            $action
        );
    };
}

/// Count how many times an action committed.
///
/// ```ignore
/// assert_eq!(count_fired!(fired, "audit.record"), 2);
/// ```
#[macro_export]
macro_rules! count_fired {
    ($fired:expr, $action:expr) => {
        $fired
            .iter()
            .filter(|f| f.committed && f.action == $action)
            .count()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action;
    use serde_json::json;

    fn model() -> Model {
        Model::new()
            .state("n", 0)
            .action("bump", action(|draft, _| {
                draft.set("n", 1)?;
                Ok(None)
            }))
            .action("broken", action(|_, _| anyhow::bail!("nope")).listen_to("bump"))
            .action("after_broken", action(|_, _| Ok(None)).listen_to("broken"))
    }

    #[test]
    fn test_harness_records_runs() {
        let mut harness = StoreHarness::new(model());

        let outcome = harness.dispatch("bump", json!({ "by": 1 })).unwrap();
        assert_eq!(outcome.failures.len(), 1);

        let fired = harness.drain_fired();
        assert_eq!(fired.len(), 2);
        assert_fired!(fired, "bump", json!({ "by": 1 }));
        assert_not_fired!(fired, "broken");
        assert_not_fired!(fired, "after_broken");
        assert_eq!(fired[1].error.as_deref(), Some("handler for `broken` failed: nope"));

        assert!(harness.drain_fired().is_empty());
    }

    #[test]
    fn test_harness_records_publishes() {
        let mut harness = StoreHarness::new(model());

        harness.dispatch("bump", Value::Null).unwrap();
        harness.dispatch("missing", Value::Null).unwrap_err();

        let published = harness.drain_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].get("n"), Some(&Value::Int(1)));
        assert!(!harness.has_published());
    }

    #[test]
    fn test_count_fired() {
        let mut harness = StoreHarness::new(model());
        harness.dispatch("bump", Value::Null).unwrap();
        harness.dispatch("bump", Value::Null).unwrap();

        let fired = harness.drain_fired();
        assert_eq!(count_fired!(fired, "bump"), 2);
        assert_eq!(count_fired!(fired, "broken"), 0);
    }

    #[test]
    fn test_try_new_reports_definition_error() {
        let model = Model::new().action("a", action(|_, _| Ok(None)).listen_to("b"));
        assert!(StoreHarness::try_new(model).is_err());
    }
}
