//! Declarative model trees
//!
//! A [`Model`] is an ordered list of named nodes. Each node is plain data
//! (initial state), an action declaration, or a nested model. The state tree
//! of a store mirrors its model with the actions left out:
//!
//! ```
//! use draft_dispatch_core::{action, Model, Value};
//! use serde_json::json;
//!
//! let model = Model::new()
//!     .state("count", 0)
//!     .action("bump", action(|draft, _| {
//!         draft.field("count")?.update(|v| Value::Int(v.as_i64().unwrap_or(0) + 1))?;
//!         Ok(None)
//!     }))
//!     .model("todos", Model::new().state("items", json!([])));
//!
//! assert_eq!(
//!     model.initial_state().to_json(),
//!     json!({ "count": 0, "todos": { "items": [] } })
//! );
//! ```

use crate::action::ActionDef;
use crate::value::{Map, Value};

/// One entry of a model.
#[derive(Debug, Clone)]
pub enum Node {
    Data(Value),
    Action(ActionDef),
    Model(Model),
}

/// An ordered, declarative model. Declaration order is registration order.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entries: Vec<(String, Node)>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add initial state under `key`.
    pub fn state(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.node(key, Node::Data(value.into()))
    }

    /// Add an action under `key`.
    pub fn action(self, key: impl Into<String>, def: ActionDef) -> Self {
        self.node(key, Node::Action(def))
    }

    /// Nest a model under `key`; its state becomes a map at that key.
    pub fn model(self, key: impl Into<String>, child: Model) -> Self {
        self.node(key, Node::Model(child))
    }

    /// Add any node. Duplicate keys are kept here and rejected at bind time.
    pub fn node(mut self, key: impl Into<String>, node: Node) -> Self {
        self.entries.push((key.into(), node));
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The state tree this model starts with.
    ///
    /// On duplicate keys the later entry wins; binding rejects such models
    /// anyway.
    pub fn initial_state(&self) -> Value {
        let mut map = Map::new();
        for (key, node) in &self.entries {
            match node {
                Node::Data(value) => {
                    map.insert(key.clone(), value.clone());
                }
                Node::Model(child) => {
                    map.insert(key.clone(), child.initial_state());
                }
                Node::Action(_) => {}
            }
        }
        Value::from(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action;
    use serde_json::json;

    #[test]
    fn test_initial_state_skips_actions() {
        let model = Model::new()
            .state("a", 1)
            .action("noop", action(|_, _| Ok(None)))
            .model("child", Model::new().state("b", "x").model("empty", Model::new()));

        assert_eq!(
            model.initial_state().to_json(),
            json!({ "a": 1, "child": { "b": "x", "empty": {} } })
        );
    }

    #[test]
    fn test_entries_keep_declaration_order() {
        let model = Model::new().state("z", 0).state("a", 0).state("m", 0);
        let keys: Vec<_> = model.entries().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(model.len(), 3);
    }
}
