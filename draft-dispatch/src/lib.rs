//! draft-dispatch: Centralized state management with draft-based actions
//!
//! Declare state, actions and nested models in one tree. Actions edit a
//! mutable-looking draft of their slice; the store turns each edit into a new
//! immutable snapshot that shares untouched subtrees with the last one. Actions
//! can listen to other actions, and a dispatch runs the whole listener cascade
//! before publishing once.
//!
//! # Example
//! ```
//! use draft_dispatch::prelude::*;
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
//! let add_todo = store.action("add_todo").unwrap();
//! add_todo.dispatch("buy milk").unwrap();
//!
//! assert_eq!(store.select(&["logs", "0"]), Some(Value::from("Added: buy milk")));
//! ```

// Re-export everything from core
pub use draft_dispatch_core::*;

/// Prelude for convenient imports
pub mod prelude {
    // Declarations
    pub use draft_dispatch_core::{action, ActionDef, ActionId, Model, Value};

    // Drafts
    pub use draft_dispatch_core::{Cursor, Draft, HandlerResult};

    // Store
    pub use draft_dispatch_core::{
        ActionHandle, DispatchOutcome, Store, StoreConfig, Subscription,
    };

    // Middleware
    pub use draft_dispatch_core::{
        ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware,
    };

    // Errors
    pub use draft_dispatch_core::{DefinitionError, DispatchError, DraftError};

    // Debug
    pub use draft_dispatch_core::debug::{ActionLoggerConfig, ActionLoggerMiddleware, DebugState};

    #[cfg(feature = "subscriptions")]
    pub use draft_dispatch_core::{snapshot_stream, SubKey, Subscriptions};
}
