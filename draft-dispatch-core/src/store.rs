//! Centralized state store with draft-based actions
//!
//! The store owns the current snapshot of the state tree and is the only thing
//! that ever replaces it. A dispatch runs the named action against a draft of
//! its scoped slice, commits the result, then runs every listener of that
//! action (and their listeners, depth-first) with the same payload. The final
//! snapshot is published once, after the whole cascade has settled, and
//! subscribers are notified before `dispatch` returns.
//!
//! # Example
//!
//! ```
//! use draft_dispatch_core::{action, Model, Store, Value};
//! use serde_json::json;
//!
//! let model = Model::new()
//!     .state("items", json!([]))
//!     .action("add_todo", action(|draft, payload| {
//!         draft.field("items")?.push(payload.clone())?;
//!         Ok(None)
//!     }))
//!     .state("logs", json!([]))
//!     .action("on_add", action(|draft, payload| {
//!         let title = payload.as_str().unwrap_or_default();
//!         draft.field("logs")?.push(format!("Added: {title}"))?;
//!         Ok(None)
//!     }).listen_to("add_todo"));
//!
//! let store = Store::new(model).unwrap();
//! let outcome = store.dispatch("add_todo", "buy milk").unwrap();
//!
//! assert_eq!(
//!     outcome.snapshot.to_json(),
//!     json!({ "items": ["buy milk"], "logs": ["Added: buy milk"] })
//! );
//! assert_eq!(store.snapshot(), outcome.snapshot);
//! ```

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard, ReentrantMutex, RwLock};
use tokio::sync::watch;

use crate::action::{ActionDescriptor, ActionId};
use crate::config::StoreConfig;
use crate::dispatch::{Commit, DispatchOutcome, DispatchRecord, ListenerFailure, RecordResult};
use crate::draft::{self, HandlerFailure};
use crate::error::{DefinitionError, DispatchError};
use crate::middleware::{Middleware, NoopMiddleware};
use crate::model::Model;
use crate::registry::Registry;
use crate::value::Value;

type SubscriberFn = dyn Fn(&Value) + Send + Sync;
type Subscribers = RwLock<Vec<(u64, Arc<SubscriberFn>)>>;

struct Inner<M> {
    config: StoreConfig,
    registry: Registry,
    current: RwLock<Value>,
    /// Serializes dispatches across threads; the flag marks a dispatch in
    /// flight on the owning thread.
    gate: ReentrantMutex<Cell<bool>>,
    middleware: Mutex<M>,
    subscribers: Arc<Subscribers>,
    next_subscriber: AtomicU64,
    watch_tx: watch::Sender<Value>,
}

/// Centralized state container.
///
/// Cloning a `Store` is cheap and yields another handle to the same state.
///
/// # Type Parameters
/// * `M` - Middleware run around every action (defaults to [`NoopMiddleware`])
pub struct Store<M = NoopMiddleware> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Store<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Store<NoopMiddleware> {
    /// Bind `model` and create a store holding its initial state.
    pub fn new(model: Model) -> Result<Self, DefinitionError> {
        Self::with_config(model, StoreConfig::default())
    }

    /// Like [`Store::new`] with explicit configuration.
    pub fn with_config(model: Model, config: StoreConfig) -> Result<Self, DefinitionError> {
        Store::with_middleware(model, config, NoopMiddleware)
    }
}

impl<M: Middleware + Send + 'static> Store<M> {
    /// Create a store whose actions run through `middleware`.
    pub fn with_middleware(
        model: Model,
        config: StoreConfig,
        middleware: M,
    ) -> Result<Self, DefinitionError> {
        let registry = Registry::bind(&model)?;
        let initial = model.initial_state();
        let (watch_tx, _) = watch::channel(initial.clone());

        tracing::debug!(
            store = %config.name,
            actions = registry.len(),
            "Store created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                registry,
                current: RwLock::new(initial),
                gate: ReentrantMutex::new(Cell::new(false)),
                middleware: Mutex::new(middleware),
                subscribers: Arc::new(RwLock::new(Vec::new())),
                next_subscriber: AtomicU64::new(0),
                watch_tx,
            }),
        })
    }

    /// Dispatch `action` with `payload`.
    ///
    /// Runs the action and its listener cascade, publishes the resulting
    /// snapshot and notifies subscribers, all before returning. On error
    /// nothing is published and no listener runs.
    ///
    /// A failing listener does not fail the dispatch: it is reported in
    /// [`DispatchOutcome::failures`] and its own listeners are skipped.
    ///
    /// Dispatches from other threads wait for the running one to finish. A
    /// dispatch issued from inside a running handler fails with
    /// [`DispatchError::Reentrant`].
    ///
    /// Only the handler's own thread is checked. A handler that hands a
    /// dispatch to another thread and then waits for it deadlocks: that
    /// thread queues behind the dispatch the handler belongs to.
    pub fn dispatch(
        &self,
        action: &str,
        payload: impl Into<Value>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let payload = payload.into();
        let gate = self.inner.gate.lock();

        if gate.get() {
            tracing::warn!(
                store = %self.inner.config.name,
                action,
                "Rejected dispatch from inside a running handler"
            );
            return Err(DispatchError::Reentrant {
                action: action.to_string(),
            });
        }

        let Some(index) = self.inner.registry.index_of(action) else {
            return Err(DispatchError::UnknownAction {
                action: action.to_string(),
            });
        };

        let settled = {
            let _in_flight = InFlight::enter(&gate);
            let settled = self.run_cascade(index, &payload)?;
            self.publish(&settled.snapshot);
            settled
        };

        if self.inner.config.log_dispatches {
            tracing::debug!(
                store = %self.inner.config.name,
                action,
                commits = settled.commits.len(),
                failures = settled.failures.len(),
                "Dispatch settled"
            );
        }

        // Subscribers may dispatch again; the in-flight flag is already clear.
        self.notify(&settled.snapshot);

        Ok(DispatchOutcome {
            action: self.inner.registry.descriptor(index).id().clone(),
            commits: settled.commits,
            failures: settled.failures,
            snapshot: settled.snapshot,
        })
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Value {
        self.inner.current.read().clone()
    }

    /// The value at `path` in the current snapshot.
    pub fn select(&self, path: &[&str]) -> Option<Value> {
        self.inner.current.read().get_path(path).cloned()
    }

    /// Call `subscriber` with every snapshot published from now on.
    ///
    /// The callback runs synchronously, once per successful top-level
    /// dispatch, after its listener cascade. Dropping the returned
    /// [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .push((id, Arc::new(subscriber)));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// A watch channel receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<Value> {
        self.inner.watch_tx.subscribe()
    }

    /// The dispatch entry point of a bound action.
    pub fn action(&self, id: &str) -> Option<ActionHandle<M>> {
        let descriptor = self.inner.registry.get(id)?;
        Some(ActionHandle {
            store: self.clone(),
            id: descriptor.id().clone(),
        })
    }

    /// Identities of every bound action, in registration order.
    pub fn actions(&self) -> impl Iterator<Item = &ActionId> {
        self.inner.registry.descriptors().iter().map(ActionDescriptor::id)
    }

    /// Listeners of `id`, in the order they fire.
    pub fn listeners_of(&self, id: &str) -> Vec<&ActionId> {
        self.inner.registry.listeners_of(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Lock the middleware, e.g. to read an action log.
    ///
    /// Do not hold the guard across a dispatch on the same thread.
    pub fn middleware(&self) -> MutexGuard<'_, M> {
        self.inner.middleware.lock()
    }

    fn run_cascade(&self, index: usize, payload: &Value) -> Result<Settled, DispatchError> {
        let registry = &self.inner.registry;
        let limit = self.inner.config.max_cascade_depth;

        let mut root = self.inner.current.read().clone();
        let mut commits = Vec::new();
        let mut failures = Vec::new();
        let mut pending: Vec<(usize, usize)> = vec![(index, 0)];

        while let Some((index, depth)) = pending.pop() {
            let descriptor = registry.descriptor(index);
            let run = match limit {
                Some(limit) if depth > limit => Err(DispatchError::CascadeTooDeep {
                    action: descriptor.id().clone(),
                    limit,
                }),
                _ => self.run_action(descriptor, &mut root, payload, depth),
            };

            match run {
                Ok(changed) => {
                    commits.push(Commit {
                        action: descriptor.id().clone(),
                        depth,
                        changed,
                    });
                    let listeners = registry.listener_indices(descriptor.id().as_str());
                    if !listeners.is_empty() {
                        tracing::trace!(
                            action = %descriptor.id(),
                            listeners = listeners.len(),
                            "Fanning out to listeners"
                        );
                    }
                    // Reversed so the first registered listener is popped first.
                    pending.extend(listeners.iter().rev().map(|&l| (l, depth + 1)));
                }
                Err(err) if depth == 0 => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        store = %self.inner.config.name,
                        action = %descriptor.id(),
                        depth,
                        error = %err,
                        "Listener failed; skipping its listeners"
                    );
                    failures.push(ListenerFailure {
                        action: descriptor.id().clone(),
                        depth,
                        error: err,
                    });
                }
            }
        }

        Ok(Settled {
            snapshot: root,
            commits,
            failures,
        })
    }

    /// Run one action against `root`. Returns whether its slice changed.
    fn run_action(
        &self,
        descriptor: &ActionDescriptor,
        root: &mut Value,
        payload: &Value,
        depth: usize,
    ) -> Result<bool, DispatchError> {
        let id = descriptor.id();
        let scope = descriptor.scope();
        self.inner.middleware.lock().before(id, payload, depth);

        let Some(prior) = root.get_path(scope).cloned() else {
            let err = DispatchError::ScopeMissing {
                action: id.clone(),
                scope: scope.join("."),
            };
            self.after(id, payload, depth, None, RecordResult::Failed(&err));
            return Err(err);
        };

        let handler = descriptor.handler();
        match draft::apply(&prior, payload, &**handler) {
            Ok(applied) => {
                if applied.mutated {
                    root.set_path(scope, applied.value.clone());
                }
                self.after(
                    id,
                    payload,
                    depth,
                    Some(&prior),
                    RecordResult::Committed {
                        next: &applied.value,
                        changed: applied.mutated,
                    },
                );
                Ok(applied.mutated)
            }
            Err(failure) => {
                let err = match failure {
                    HandlerFailure::Failed(reason) => DispatchError::HandlerFailed {
                        action: id.clone(),
                        reason,
                    },
                    HandlerFailure::Panicked(message) => DispatchError::HandlerPanicked {
                        action: id.clone(),
                        message,
                    },
                };
                self.after(id, payload, depth, Some(&prior), RecordResult::Failed(&err));
                Err(err)
            }
        }
    }

    fn after(
        &self,
        action: &ActionId,
        payload: &Value,
        depth: usize,
        prior: Option<&Value>,
        result: RecordResult<'_>,
    ) {
        self.inner.middleware.lock().after(&DispatchRecord {
            action,
            payload,
            depth,
            prior,
            result,
        });
    }

    fn publish(&self, snapshot: &Value) {
        *self.inner.current.write() = snapshot.clone();
        self.inner.watch_tx.send_replace(snapshot.clone());
    }

    fn notify(&self, snapshot: &Value) {
        let subscribers: Vec<Arc<SubscriberFn>> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            // A subscriber dispatched and every subscriber has already seen
            // the newer snapshot.
            if !self.inner.current.read().ptr_eq(snapshot) {
                return;
            }
            subscriber(snapshot);
        }
    }
}

impl<M> fmt::Debug for Store<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("actions", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

struct Settled {
    snapshot: Value,
    commits: Vec<Commit>,
    failures: Vec<ListenerFailure>,
}

/// Marks a dispatch in flight for as long as it lives.
struct InFlight<'a>(&'a Cell<bool>);

impl<'a> InFlight<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A bound action: the dispatch entry point handed to consumers.
pub struct ActionHandle<M = NoopMiddleware> {
    store: Store<M>,
    id: ActionId,
}

impl<M> Clone for ActionHandle<M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            id: self.id.clone(),
        }
    }
}

impl<M: Middleware + Send + 'static> ActionHandle<M> {
    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// Dispatch this action with `payload`.
    pub fn dispatch(&self, payload: impl Into<Value>) -> Result<DispatchOutcome, DispatchError> {
        self.store.dispatch(self.id.as_str(), payload)
    }
}

impl<M> fmt::Debug for ActionHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionHandle").field(&self.id).finish()
    }
}

/// Keeps a snapshot subscriber registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Keep the subscriber registered for the life of the store.
    pub fn detach(mut self) {
        self.subscribers = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.write().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
