//! Action registry and listener index
//!
//! Binding is two passes over a [`Model`]:
//!
//! 1. walk the tree depth-first in declaration order and give every action the
//!    identity of its path
//! 2. resolve every `listen_to` target against the full set of identities and
//!    build the listener index (target -> listeners, in registration order)
//!
//! A third check rejects listener cycles, so a dispatch cascade always
//! terminates.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::action::{ActionDescriptor, ActionId};
use crate::error::DefinitionError;
use crate::model::{Model, Node};

/// Bound actions of one store. Immutable once built.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: Vec<ActionDescriptor>,
    by_id: HashMap<ActionId, usize>,
    listeners: HashMap<ActionId, Vec<usize>>,
}

impl Registry {
    /// Bind every action of `model`.
    pub fn bind(model: &Model) -> Result<Self, DefinitionError> {
        let mut descriptors = Vec::new();
        collect(model, &mut Vec::new(), &mut descriptors)?;

        let by_id: HashMap<ActionId, usize> = descriptors
            .iter()
            .enumerate()
            .map(|(index, d): (usize, &ActionDescriptor)| (d.id().clone(), index))
            .collect();

        let mut listeners: HashMap<ActionId, Vec<usize>> = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            for target in descriptor.listen_to() {
                if !by_id.contains_key(target) {
                    return Err(DefinitionError::UnresolvedTarget {
                        listener: descriptor.id().clone(),
                        target: target.clone(),
                    });
                }
                listeners.entry(target.clone()).or_default().push(index);
            }
        }

        let registry = Self {
            descriptors,
            by_id,
            listeners,
        };
        registry.check_cycles()?;

        tracing::debug!(
            actions = registry.descriptors.len(),
            targets = registry.listeners.len(),
            "Model bound"
        );
        Ok(registry)
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> &[ActionDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ActionDescriptor> {
        self.index_of(id).map(|index| &self.descriptors[index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub(crate) fn descriptor(&self, index: usize) -> &ActionDescriptor {
        &self.descriptors[index]
    }

    /// Listener indices of `id`, in registration order.
    pub(crate) fn listener_indices(&self, id: &str) -> &[usize] {
        self.listeners.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Listener identities of `id`, in registration order.
    pub fn listeners_of(&self, id: &str) -> Vec<&ActionId> {
        self.listener_indices(id)
            .iter()
            .map(|&index| self.descriptors[index].id())
            .collect()
    }

    fn check_cycles(&self) -> Result<(), DefinitionError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.descriptors.len()];

        for start in 0..self.descriptors.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // Explicit stack of (node, next listener position) to avoid
            // recursion on long chains.
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::OnPath;

            while let Some(&mut (node, ref mut next)) = stack.last_mut() {
                let listeners = self.listener_indices(self.descriptors[node].id().as_str());
                if let Some(&child) = listeners.get(*next) {
                    *next += 1;
                    match marks[child] {
                        Mark::Unvisited => {
                            marks[child] = Mark::OnPath;
                            stack.push((child, 0));
                        }
                        Mark::OnPath => {
                            let from = stack
                                .iter()
                                .position(|&(n, _)| n == child)
                                .unwrap_or(0);
                            let mut cycle: Vec<ActionId> = stack[from..]
                                .iter()
                                .map(|&(n, _)| self.descriptors[n].id().clone())
                                .collect();
                            cycle.push(self.descriptors[child].id().clone());
                            return Err(DefinitionError::ListenerCycle { cycle });
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

fn collect(
    model: &Model,
    path: &mut Vec<String>,
    out: &mut Vec<ActionDescriptor>,
) -> Result<(), DefinitionError> {
    let mut seen: HashSet<&str> = HashSet::new();

    for (key, node) in model.entries() {
        if key.is_empty() || key.contains('.') {
            return Err(DefinitionError::InvalidKey {
                path: display_model_path(path),
                key: key.to_string(),
            });
        }
        if !seen.insert(key) {
            return Err(DefinitionError::DuplicateKey {
                path: display_model_path(path),
                key: key.to_string(),
            });
        }

        match node {
            Node::Data(_) => {}
            Node::Action(def) => {
                path.push(key.to_string());
                let id = ActionId::from_segments(path.as_slice());
                path.pop();
                tracing::trace!(action = %id, "Registering action");
                out.push(ActionDescriptor::new(id, def));
            }
            Node::Model(child) => {
                path.push(key.to_string());
                let result = collect(child, path, out);
                path.pop();
                result?;
            }
        }
    }
    Ok(())
}

fn display_model_path(path: &[String]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}
