//! Dispatch outcomes and per-action records
//!
//! A top-level [`Store::dispatch`](crate::Store::dispatch) runs the target
//! action and then its listener cascade. Its result is a [`DispatchOutcome`]
//! listing every commit in order, plus the listener failures that were skipped
//! over. Middleware sees one [`DispatchRecord`] per action run, cascaded
//! listeners included.

use crate::action::ActionId;
use crate::error::DispatchError;
use crate::value::Value;

/// One committed action within a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub action: ActionId,
    /// 0 for the dispatched action, 1 for its listeners, and so on.
    pub depth: usize,
    /// Whether the handler changed its slice.
    pub changed: bool,
}

/// A listener whose handler failed during a cascade.
///
/// Its own listeners were skipped; commits before it were kept.
#[derive(Debug)]
pub struct ListenerFailure {
    pub action: ActionId,
    pub depth: usize,
    pub error: DispatchError,
}

/// Result of a successful top-level dispatch.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The action that was dispatched.
    pub action: ActionId,
    /// Commits in the order they happened: target first, then listeners
    /// depth-first in registration order.
    pub commits: Vec<Commit>,
    /// Listeners that failed; empty on a clean cascade.
    pub failures: Vec<ListenerFailure>,
    /// The snapshot published at the end of the dispatch.
    pub snapshot: Value,
}

impl DispatchOutcome {
    /// Whether any commit changed state.
    pub fn changed(&self) -> bool {
        self.commits.iter().any(|commit| commit.changed)
    }

    /// Identities of every committed action, in commit order.
    pub fn fired(&self) -> impl Iterator<Item = &ActionId> {
        self.commits.iter().map(|commit| &commit.action)
    }

    /// Whether `action` committed during this dispatch.
    pub fn did_fire(&self, action: &str) -> bool {
        self.fired().any(|id| id.as_str() == action)
    }

    /// No listener failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What happened to one action run.
#[derive(Debug)]
pub enum RecordResult<'a> {
    Committed { next: &'a Value, changed: bool },
    Failed(&'a DispatchError),
}

/// Ephemeral view of one action run, handed to middleware.
#[derive(Debug)]
pub struct DispatchRecord<'a> {
    pub action: &'a ActionId,
    pub payload: &'a Value,
    pub depth: usize,
    /// Scoped slice before the handler ran; `None` if the scope did not resolve.
    pub prior: Option<&'a Value>,
    pub result: RecordResult<'a>,
}

impl DispatchRecord<'_> {
    pub fn succeeded(&self) -> bool {
        matches!(self.result, RecordResult::Committed { .. })
    }

    /// Whether the run committed a change.
    pub fn changed(&self) -> bool {
        matches!(self.result, RecordResult::Committed { changed: true, .. })
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self.result {
            RecordResult::Failed(err) => Some(err),
            RecordResult::Committed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(action: &str, depth: usize, changed: bool) -> Commit {
        Commit {
            action: ActionId::from(action),
            depth,
            changed,
        }
    }

    #[test]
    fn test_outcome_queries() {
        let outcome = DispatchOutcome {
            action: ActionId::from("t"),
            commits: vec![commit("t", 0, false), commit("l", 1, true)],
            failures: vec![],
            snapshot: Value::Null,
        };

        assert!(outcome.changed());
        assert!(outcome.did_fire("l"));
        assert!(!outcome.did_fire("x"));
        assert!(outcome.is_clean());
        let fired: Vec<_> = outcome.fired().map(ActionId::as_str).collect();
        assert_eq!(fired, vec!["t", "l"]);
    }

    #[test]
    fn test_record_accessors() {
        let id = ActionId::from("t");
        let payload = Value::Null;
        let prior = Value::Int(0);
        let next = Value::Int(1);
        let record = DispatchRecord {
            action: &id,
            payload: &payload,
            depth: 0,
            prior: Some(&prior),
            result: RecordResult::Committed {
                next: &next,
                changed: true,
            },
        };
        assert!(record.succeeded());
        assert!(record.changed());
        assert!(record.error().is_none());

        let err = DispatchError::UnknownAction {
            action: "t".to_string(),
        };
        let failed = DispatchRecord {
            result: RecordResult::Failed(&err),
            ..record
        };
        assert!(!failed.succeeded());
        assert!(!failed.changed());
        assert_eq!(failed.error().map(DispatchError::action), Some("t"));
    }
}
