//! Core types for draft-dispatch
//!
//! This crate provides a centralized state store whose actions are written as
//! plain mutations against a draft of their slice of the state tree. Every
//! committed update yields a new immutable snapshot that shares all untouched
//! subtrees with the previous one.
//!
//! # Core Concepts
//!
//! - **Model**: a declaration tree of state values, actions and nested models
//! - **Action**: a handler plus the actions it listens to; its identity is its
//!   dotted path in the model (`todos.add`)
//! - **Draft**: the mutable-looking view of a slice a handler edits
//! - **Store**: binds a model, dispatches actions and their listener cascades,
//!   and publishes one snapshot per dispatch
//! - **Middleware**: hooks around every action run
//!
//! # Basic Example
//!
//! ```
//! use draft_dispatch_core::prelude::*;
//! use serde_json::json;
//!
//! let model = Model::new().model(
//!     "counter",
//!     Model::new()
//!         .state("value", 0)
//!         .action("increment", action(|draft, _| {
//!             draft
//!                 .field("value")?
//!                 .update(|v| Value::from(v.as_i64().unwrap_or(0) + 1))?;
//!             Ok(None)
//!         })),
//! );
//!
//! let store = Store::new(model).unwrap();
//! let before = store.snapshot();
//! store.dispatch("counter.increment", Value::Null).unwrap();
//!
//! assert_eq!(store.snapshot().to_json(), json!({ "counter": { "value": 1 } }));
//! // Snapshots are immutable; the old one is untouched
//! assert_eq!(before.to_json(), json!({ "counter": { "value": 0 } }));
//! ```
//!
//! # Listeners
//!
//! An action may listen to other actions. After its target commits, every
//! listener runs with the same payload, in registration order, depth-first.
//! The whole cascade settles before `dispatch` returns and is published as a
//! single snapshot.
//!
//! ```
//! use draft_dispatch_core::prelude::*;
//!
//! let model = Model::new()
//!     .model("todos", Model::new()
//!         .state("items", Value::list())
//!         .action("add", action(|draft, payload| {
//!             draft.field("items")?.push(payload.clone())?;
//!             Ok(None)
//!         })))
//!     .model("stats", Model::new()
//!         .state("added", 0)
//!         .action("count", action(|draft, _| {
//!             draft.field("added")?.update(|v| Value::from(v.as_i64().unwrap_or(0) + 1))?;
//!             Ok(None)
//!         }).listen_to("todos.add")));
//!
//! let store = Store::new(model).unwrap();
//! let outcome = store.dispatch("todos.add", "buy milk").unwrap();
//!
//! assert!(outcome.did_fire("stats.count"));
//! assert_eq!(store.select(&["stats", "added"]), Some(Value::from(1)));
//! ```

pub mod action;
pub mod config;
pub mod debug;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod middleware;
pub mod model;
pub mod registry;
pub mod store;
#[cfg(feature = "subscriptions")]
pub mod subscriptions;
pub mod testing;
pub mod value;

// Declaration exports
pub use action::{action, ActionDef, ActionDescriptor, ActionId, Handler};
pub use model::{Model, Node};
pub use value::{Map, Value};

// Draft exports
pub use draft::{apply, Applied, Cursor, Draft, HandlerFailure, HandlerResult};

// Store exports
pub use config::StoreConfig;
pub use dispatch::{Commit, DispatchOutcome, DispatchRecord, ListenerFailure, RecordResult};
pub use registry::Registry;
pub use store::{ActionHandle, Store, Subscription};

// Middleware exports
pub use middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};

// Error exports
pub use error::{DefinitionError, DispatchError, DraftError};

// Subscription exports (requires "subscriptions" feature)
#[cfg(feature = "subscriptions")]
pub use subscriptions::{snapshot_changes, snapshot_stream, SubKey, Subscriptions};

// Testing exports
pub use testing::{FiredAction, RecordingMiddleware, StoreHarness};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{action, ActionDef, ActionId};
    pub use crate::config::StoreConfig;
    pub use crate::dispatch::DispatchOutcome;
    pub use crate::draft::{Cursor, Draft, HandlerResult};
    pub use crate::error::{DefinitionError, DispatchError, DraftError};
    pub use crate::middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};
    pub use crate::model::Model;
    pub use crate::store::{ActionHandle, Store, Subscription};
    #[cfg(feature = "subscriptions")]
    pub use crate::subscriptions::{snapshot_stream, SubKey, Subscriptions};
    pub use crate::value::Value;
}
