//! Debug and inspection utilities
//!
//! - **Action Logging**: glob-filtered action logs, to tracing and to an
//!   in-memory ring buffer
//! - **State Inspection**: [`DebugState`] sections for snapshots, drafts and
//!   stores
//!
//! # State Inspection
//!
//! ```
//! use draft_dispatch_core::debug::DebugState;
//! use draft_dispatch_core::Value;
//! use serde_json::json;
//!
//! let snapshot = Value::from(json!({ "todos": { "items": ["milk"] } }));
//! let sections = snapshot.debug_sections();
//! assert_eq!(sections[0].title, "todos");
//! assert_eq!(sections[0].entries[0].key, "items");
//! ```
//!
//! Inside a handler, `draft.debug_sections()` shows the untouched prior value
//! next to the edits made so far.
//!
//! # Action Logging
//!
//! Use [`ActionLoggerMiddleware`] for pattern-based action filtering:
//!
//! ```
//! use draft_dispatch_core::debug::ActionLoggerConfig;
//!
//! // Log only actions of the todos model, except its filter actions
//! let config = ActionLoggerConfig::new(Some("todos.*"), Some("todos.filters.*"));
//! assert!(config.should_log("todos.add"));
//!
//! // Or take patterns from DRAFT_DISPATCH_LOG_INCLUDE / DRAFT_DISPATCH_LOG_EXCLUDE
//! let config = ActionLoggerConfig::from_env();
//! ```

pub mod action_logger;
pub mod state;

pub use state::{DebugEntry, DebugSection, DebugState, DebugWrapper};

pub use action_logger::{
    glob_match, ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig,
    ActionLoggerMiddleware, LOG_EXCLUDE_ENV, LOG_INCLUDE_ENV,
};
