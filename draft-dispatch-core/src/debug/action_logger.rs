//! Action logging with pattern-based filtering and in-memory storage
//!
//! Provides configurable action logging using glob patterns to include/exclude
//! specific actions from logs. Supports both tracing output and an in-memory
//! ring buffer of recent commits and failures.
//!
//! # Example
//!
//! ```
//! use draft_dispatch_core::debug::{ActionLogConfig, ActionLoggerMiddleware};
//! use draft_dispatch_core::{action, Model, Store, StoreConfig, Value};
//!
//! let model = Model::new()
//!     .state("n", 0)
//!     .action("bump", action(|draft, _| {
//!         draft.set("n", 1)?;
//!         Ok(None)
//!     }));
//! let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::default());
//! let store = Store::with_middleware(model, StoreConfig::default(), logger).unwrap();
//!
//! store.dispatch("bump", Value::Null).unwrap();
//!
//! let middleware = store.middleware();
//! let entry = middleware.log().unwrap().recent(1).next().unwrap();
//! assert_eq!(entry.action, "bump");
//! assert_eq!(entry.state_changed, Some(true));
//! ```

use std::collections::VecDeque;
use std::time::Instant;

use crate::action::ActionId;
use crate::dispatch::{DispatchRecord, RecordResult};
use crate::middleware::Middleware;
use crate::value::Value;

/// Environment variable holding comma-separated include patterns.
pub const LOG_INCLUDE_ENV: &str = "DRAFT_DISPATCH_LOG_INCLUDE";
/// Environment variable holding comma-separated exclude patterns.
pub const LOG_EXCLUDE_ENV: &str = "DRAFT_DISPATCH_LOG_EXCLUDE";

/// Configuration for action logging with glob pattern filtering.
///
/// Patterns match against the full dotted action identity and support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// # Examples
///
/// - `todos.*` matches `todos.add`, `todos.filters.set`, etc.
/// - `*.reset` matches `reset` actions in any model below the root
/// - `tick` matches only the root `tick` action
#[derive(Debug, Clone, Default)]
pub struct ActionLoggerConfig {
    /// If non-empty, only log actions matching these patterns
    pub include_patterns: Vec<String>,
    /// Exclude actions matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl ActionLoggerConfig {
    /// Create a new config from comma-separated pattern strings
    ///
    /// # Example
    /// ```
    /// use draft_dispatch_core::debug::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("todos.*,reset"), Some("todos.tick"));
    /// assert!(config.should_log("todos.add"));
    /// assert!(config.should_log("reset"));
    /// assert!(!config.should_log("todos.tick"));
    /// assert!(!config.should_log("audit.record"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    /// Read patterns from `DRAFT_DISPATCH_LOG_INCLUDE` and
    /// `DRAFT_DISPATCH_LOG_EXCLUDE`. Unset variables mean no filtering.
    pub fn from_env() -> Self {
        let include = std::env::var(LOG_INCLUDE_ENV).ok();
        let exclude = std::env::var(LOG_EXCLUDE_ENV).ok();
        Self::new(include.as_deref(), exclude.as_deref())
    }

    /// Create a config with specific pattern vectors
    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Check if an action should be logged based on include/exclude patterns
    pub fn should_log(&self, action: &str) -> bool {
        // If include patterns specified, action must match at least one
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| glob_match(p, action))
        {
            return false;
        }

        !self.exclude_patterns.iter().any(|p| glob_match(p, action))
    }
}

fn split_patterns(patterns: &str) -> Vec<String> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// In-Memory Action Log
// ============================================================================

/// An entry in the action log
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub action: ActionId,
    /// Compact JSON rendering of the payload
    pub payload: String,
    /// Cascade depth; 0 for a top-level dispatch
    pub depth: usize,
    /// Timestamp when the action was logged
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
    /// Whether the action changed state (set once it settles)
    pub state_changed: Option<bool>,
    /// Failure message, if the handler failed
    pub error: Option<String>,
}

impl ActionLogEntry {
    /// Create a new log entry
    pub fn new(action: ActionId, payload: &Value, depth: usize, sequence: u64) -> Self {
        Self {
            action,
            payload: payload.to_string(),
            depth,
            timestamp: Instant::now(),
            sequence,
            state_changed: None,
            error: None,
        }
    }

    /// One-line summary, e.g. `todos.add("buy milk")`
    pub fn summary(&self) -> String {
        format!("{}({})", self.action, self.payload)
    }

    /// Time since this action was logged
    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the action log ring buffer
#[derive(Debug, Clone)]
pub struct ActionLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    /// Create with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Create with custom capacity and filter
    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// In-memory ring buffer for storing recent actions
///
/// Older entries are automatically discarded when capacity is reached.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    /// Create a new action log with configuration
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Log an action (if it passes the filter)
    ///
    /// Returns the entry if it was logged, None if filtered out.
    pub fn log(&mut self, action: &ActionId, payload: &Value, depth: usize) -> Option<&ActionLogEntry> {
        if !self.config.filter.should_log(action.as_str()) {
            return None;
        }

        let entry = ActionLogEntry::new(action.clone(), payload, depth, self.next_sequence);
        self.next_sequence += 1;

        // Maintain capacity
        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }

        self.entries.push_back(entry);
        self.entries.back()
    }

    /// Record how the last logged action settled
    pub fn settle_last(&mut self, changed: bool, error: Option<String>) {
        if let Some(entry) = self.entries.back_mut() {
            entry.state_changed = Some(changed);
            entry.error = error;
        }
    }

    /// Get all entries (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// Get the most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Middleware that logs actions with configurable pattern filtering.
///
/// Supports two modes:
/// - **Tracing only** (default): logs via `tracing::debug!()`
/// - **With storage**: also keeps an [`ActionLog`] ring buffer
///
/// Cascaded listeners are logged like top-level actions, with their depth.
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    config: ActionLoggerConfig,
    log: Option<ActionLog>,
    /// Tracks whether the last action was logged (for settle updates)
    last_action_logged: bool,
    /// When false, all hooks are no-ops.
    active: bool,
}

impl ActionLoggerMiddleware {
    /// Create a new action logger middleware with tracing only (no in-memory storage)
    pub fn new(config: ActionLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            last_action_logged: false,
            active: true,
        }
    }

    /// Create middleware with in-memory storage
    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(ActionLog::new(config)),
            last_action_logged: false,
            active: true,
        }
    }

    /// Tracing only, filtered by the `DRAFT_DISPATCH_LOG_*` variables
    pub fn from_env() -> Self {
        Self::new(ActionLoggerConfig::from_env())
    }

    /// Set whether the middleware is active.
    ///
    /// ```
    /// use draft_dispatch_core::debug::ActionLoggerMiddleware;
    ///
    /// let debug = std::env::var_os("APP_DEBUG").is_some();
    /// let middleware = ActionLoggerMiddleware::from_env().active(debug);
    /// assert_eq!(middleware.is_active(), debug);
    /// ```
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Get the action log (if storage is enabled)
    pub fn log(&self) -> Option<&ActionLog> {
        self.log.as_ref()
    }

    pub fn log_mut(&mut self) -> Option<&mut ActionLog> {
        self.log.as_mut()
    }

    pub fn config(&self) -> &ActionLoggerConfig {
        &self.config
    }
}

impl Middleware for ActionLoggerMiddleware {
    fn before(&mut self, action: &ActionId, payload: &Value, depth: usize) {
        if !self.active {
            return;
        }

        if self.config.should_log(action.as_str()) {
            tracing::debug!(action = %action, depth, payload = %payload, "action");
        }

        self.last_action_logged = false;
        if let Some(ref mut log) = self.log {
            if log.log(action, payload, depth).is_some() {
                self.last_action_logged = true;
            }
        }
    }

    fn after(&mut self, record: &DispatchRecord<'_>) {
        if !self.active || !self.last_action_logged {
            return;
        }

        let error = match record.result {
            RecordResult::Failed(err) => Some(err.to_string()),
            RecordResult::Committed { .. } => None,
        };
        if let Some(ref mut log) = self.log {
            log.settle_last(record.changed(), error);
        }
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_impl(&pattern, &text)
}

fn glob_match_impl(pattern: &[char], text: &[char]) -> bool {
    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(spi) = star_pi {
            pi = spi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("tick", "tick"));
        assert!(!glob_match("tick", "tock"));
        assert!(!glob_match("tick", "ticktock"));
    }

    #[test]
    fn test_glob_match_star() {
        assert!(glob_match("todos.*", "todos.add"));
        assert!(glob_match("todos.*", "todos.filters.set"));
        assert!(!glob_match("todos.*", "audit.todos.add"));

        assert!(glob_match("*.reset", "todos.reset"));
        assert!(glob_match("*filters*", "todos.filters.set"));
    }

    #[test]
    fn test_glob_match_question() {
        assert!(glob_match("step?", "step1"));
        assert!(!glob_match("step?", "step"));
        assert!(!glob_match("step?", "step12"));
    }

    #[test]
    fn test_action_logger_config_include_and_exclude() {
        let config = ActionLoggerConfig::new(Some("todos.*"), Some("todos.filters.*"));
        assert!(config.should_log("todos.add"));
        assert!(!config.should_log("todos.filters.set"));
        assert!(!config.should_log("audit.record")); // Not in include
    }

    #[test]
    fn test_action_logger_config_default_logs_everything() {
        let config = ActionLoggerConfig::default();
        assert!(config.should_log("tick"));
        assert!(config.should_log("todos.add"));
    }

    #[test]
    fn test_patterns_are_trimmed() {
        let config = ActionLoggerConfig::new(Some(" a , b ,"), None);
        assert_eq!(config.include_patterns, vec!["a", "b"]);
    }

    #[test]
    fn test_action_log_capacity() {
        let mut log = ActionLog::new(ActionLogConfig::with_capacity(3));
        let id = ActionId::from("todos.add");

        for _ in 0..4 {
            log.log(&id, &Value::Null, 0);
        }
        assert_eq!(log.len(), 3);
        // Sequence 0 was evicted
        assert_eq!(log.entries().next().unwrap().sequence, 1);
        assert_eq!(log.recent(1).next().unwrap().sequence, 3);
    }

    #[test]
    fn test_action_log_entry_summary() {
        let entry = ActionLogEntry::new(ActionId::from("todos.add"), &Value::from("milk"), 0, 0);
        assert_eq!(entry.summary(), r#"todos.add("milk")"#);
        let display = entry.elapsed_display();
        assert!(display.ends_with("ms") || display.ends_with('s'));
    }

    #[test]
    fn test_middleware_filtered_action_does_not_settle_previous() {
        let filter = ActionLoggerConfig::new(None, Some("tick"));
        let mut middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::new(10, filter));

        let add = ActionId::from("add");
        let tick = ActionId::from("tick");
        let payload = Value::Null;
        let next = Value::Null;

        middleware.before(&add, &payload, 0);
        middleware.after(&DispatchRecord {
            action: &add,
            payload: &payload,
            depth: 0,
            prior: None,
            result: RecordResult::Committed { next: &next, changed: true },
        });

        let err = DispatchError::UnknownAction { action: "tick".into() };
        middleware.before(&tick, &payload, 0);
        middleware.after(&DispatchRecord {
            action: &tick,
            payload: &payload,
            depth: 0,
            prior: None,
            result: RecordResult::Failed(&err),
        });

        let log = middleware.log().unwrap();
        assert_eq!(log.len(), 1);
        let entry = log.entries().next().unwrap();
        assert_eq!(entry.state_changed, Some(true));
        assert!(entry.error.is_none());
    }

    #[test]
    fn test_inactive_middleware_logs_nothing() {
        let mut middleware = ActionLoggerMiddleware::with_log(ActionLogConfig::default()).active(false);
        middleware.before(&ActionId::from("add"), &Value::Null, 0);
        assert!(middleware.log().unwrap().is_empty());
    }
}
