//! Error types for model binding, dispatch and draft edits

use thiserror::Error;

use crate::action::ActionId;

/// A misconfigured model. Raised while the store is being constructed; a store
/// is never built from a model that produces one of these.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("duplicate key `{key}` in model at `{path}`")]
    DuplicateKey { path: String, key: String },

    #[error("invalid key `{key}` in model at `{path}`: keys must be non-empty and must not contain '.'")]
    InvalidKey { path: String, key: String },

    #[error("`{listener}` listens to `{target}`, which is not a bound action")]
    UnresolvedTarget { listener: ActionId, target: ActionId },

    #[error("listener cycle: {}", display_cycle(.cycle))]
    ListenerCycle { cycle: Vec<ActionId> },
}

fn display_cycle(cycle: &[ActionId]) -> String {
    cycle
        .iter()
        .map(ActionId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A failed dispatch. The published snapshot is left as it was.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown action `{action}`")]
    UnknownAction { action: String },

    #[error("handler for `{action}` failed: {reason:#}")]
    HandlerFailed {
        action: ActionId,
        reason: anyhow::Error,
    },

    #[error("handler for `{action}` panicked: {message}")]
    HandlerPanicked { action: ActionId, message: String },

    #[error("`{action}` was dispatched from inside a running handler")]
    Reentrant { action: String },

    #[error("listener cascade exceeded depth {limit} at `{action}`")]
    CascadeTooDeep { action: ActionId, limit: usize },

    #[error("scope `{scope}` of `{action}` no longer exists in the state tree")]
    ScopeMissing { action: ActionId, scope: String },
}

impl DispatchError {
    /// Identity of the action the error is about, as a string.
    pub fn action(&self) -> &str {
        match self {
            DispatchError::UnknownAction { action } | DispatchError::Reentrant { action } => action,
            DispatchError::HandlerFailed { action, .. }
            | DispatchError::HandlerPanicked { action, .. }
            | DispatchError::CascadeTooDeep { action, .. }
            | DispatchError::ScopeMissing { action, .. } => action.as_str(),
        }
    }

    /// The error returned by the handler, if that is what failed.
    pub fn handler_error(&self) -> Option<&anyhow::Error> {
        match self {
            DispatchError::HandlerFailed { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_reentrant(&self) -> bool {
        matches!(self, DispatchError::Reentrant { .. })
    }
}

/// An edit a handler attempted on its draft that does not fit the data.
///
/// Handlers usually propagate these with `?`, which turns them into a
/// [`DispatchError::HandlerFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    #[error("expected {expected} at `{path}`, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("no key `{key}` at `{path}`")]
    MissingKey { path: String, key: String },

    #[error("index {index} out of bounds (len {len}) at `{path}`")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = DefinitionError::ListenerCycle {
            cycle: vec![
                ActionId::from("a"),
                ActionId::from("b"),
                ActionId::from("a"),
            ],
        };
        assert_eq!(err.to_string(), "listener cycle: a -> b -> a");
    }

    #[test]
    fn test_handler_failed_keeps_reason() {
        let err = DispatchError::HandlerFailed {
            action: ActionId::from("todos.add"),
            reason: anyhow::anyhow!("empty title"),
        };
        assert_eq!(err.action(), "todos.add");
        assert_eq!(err.to_string(), "handler for `todos.add` failed: empty title");
        assert!(err.handler_error().is_some());
        assert!(!err.is_reentrant());
    }
}
