//! Action identities, declarations and bound descriptors

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::draft::{Draft, HandlerResult};
use crate::value::Value;

/// Shared handler function of an action.
pub type Handler = Arc<dyn Fn(&mut Draft<'_>, &Value) -> HandlerResult + Send + Sync>;

/// Path-qualified identity of an action, e.g. `todos.add`.
///
/// Segments are the model keys from the root down to the action itself.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(Arc<str>);

impl ActionId {
    /// Identity from its model path.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Self {
        let joined = segments
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(".");
        Self(Arc::from(joined))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key the action was declared under.
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Path of the model that owns this action; empty for root actions.
    pub fn scope(&self) -> Vec<String> {
        let mut segments: Vec<String> = self.segments().map(str::to_string).collect();
        segments.pop();
        segments
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ActionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ActionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&ActionId> for ActionId {
    fn from(id: &ActionId) -> Self {
        id.clone()
    }
}

impl PartialEq<str> for ActionId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ActionId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Declare an action from its handler.
///
/// The handler receives a draft of the state of the model the action is
/// declared in, plus the dispatch payload. Declaring has no side effect; the
/// action is bound when a store is built from the model.
///
/// # Example
///
/// ```
/// use draft_dispatch_core::{action, Model};
/// use serde_json::json;
///
/// let model = Model::new()
///     .state("items", json!([]))
///     .action("add", action(|draft, payload| {
///         draft.field("items")?.push(payload.clone())?;
///         Ok(None)
///     }))
///     .state("log", json!([]))
///     .action("on_add", action(|draft, payload| {
///         draft.field("log")?.push(format!("Added: {}", payload.as_str().unwrap_or("?")))?;
///         Ok(None)
///     }).listen_to("add"));
/// # let _ = model;
/// ```
pub fn action<F>(handler: F) -> ActionDef
where
    F: Fn(&mut Draft<'_>, &Value) -> HandlerResult + Send + Sync + 'static,
{
    ActionDef {
        handler: Arc::new(handler),
        listen_to: Vec::new(),
    }
}

/// An unbound action declaration.
#[derive(Clone)]
pub struct ActionDef {
    pub(crate) handler: Handler,
    pub(crate) listen_to: Vec<ActionId>,
}

impl ActionDef {
    /// Also fire after `target` commits successfully, with the target's payload.
    ///
    /// Targets are absolute identities (`"todos.add"`); they may name actions
    /// declared anywhere in the model, before or after this one.
    pub fn listen_to(mut self, target: impl Into<ActionId>) -> Self {
        self.listen_to.push(target.into());
        self
    }

    /// Listen to several targets at once.
    pub fn listen_to_all<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ActionId>,
    {
        self.listen_to.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn targets(&self) -> &[ActionId] {
        &self.listen_to
    }
}

impl fmt::Debug for ActionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDef")
            .field("listen_to", &self.listen_to)
            .finish_non_exhaustive()
    }
}

/// An action bound into a store: identity, scope and handler.
#[derive(Clone)]
pub struct ActionDescriptor {
    id: ActionId,
    scope: Vec<String>,
    handler: Handler,
    listen_to: Vec<ActionId>,
}

impl ActionDescriptor {
    pub(crate) fn new(id: ActionId, def: &ActionDef) -> Self {
        let scope = id.scope();
        let mut listen_to: Vec<ActionId> = Vec::with_capacity(def.listen_to.len());
        for target in &def.listen_to {
            if !listen_to.contains(target) {
                listen_to.push(target.clone());
            }
        }
        Self {
            id,
            scope,
            handler: def.handler.clone(),
            listen_to,
        }
    }

    pub fn id(&self) -> &ActionId {
        &self.id
    }

    /// Path of the state slice the handler receives.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Targets this action listens to, deduplicated, in declaration order.
    pub fn listen_to(&self) -> &[ActionId] {
        &self.listen_to
    }

    pub(crate) fn handler(&self) -> &Handler {
        &self.handler
    }
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("listen_to", &self.listen_to)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_id_parts() {
        let id = ActionId::from_segments(&["todos", "list", "add"]);
        assert_eq!(id.as_str(), "todos.list.add");
        assert_eq!(id.name(), "add");
        assert_eq!(id.scope(), vec!["todos".to_string(), "list".to_string()]);
        assert_eq!(id, "todos.list.add");
    }

    #[test]
    fn test_root_action_has_empty_scope() {
        let id = ActionId::from("reset");
        assert_eq!(id.name(), "reset");
        assert!(id.scope().is_empty());
    }

    #[test]
    fn test_descriptor_dedupes_targets() {
        let def = action(|_, _| Ok(None))
            .listen_to("a")
            .listen_to_all(["b", "a"]);
        let descriptor = ActionDescriptor::new(ActionId::from("x.on"), &def);

        assert_eq!(descriptor.listen_to(), &[ActionId::from("a"), ActionId::from("b")]);
        assert_eq!(descriptor.scope(), &["x".to_string()]);
    }
}
