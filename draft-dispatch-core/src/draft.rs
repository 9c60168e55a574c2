//! Draft mutation engine
//!
//! A [`Draft`] gives a handler a mutable-looking view of a scoped state slice.
//! Reads see the prior value; writes go to a private working copy. Copying is
//! lazy and path-scoped: a write walks from the draft root to its target with
//! `Arc::make_mut`, so only the containers on that path are cloned and every
//! other subtree stays shared with the prior value.
//!
//! [`apply`] runs a handler against a draft and finalizes the result:
//!
//! - handler returns `Ok(None)`: the working copy (edited or not) is the result
//! - handler returns `Ok(Some(value))`: `value` replaces the slice and draft
//!   edits are dropped
//! - handler returns `Err` or panics: the working copy is dropped and the
//!   failure is reported; the prior value was never touched
//!
//! # Example
//!
//! ```
//! use draft_dispatch_core::draft::apply;
//! use draft_dispatch_core::Value;
//! use serde_json::json;
//!
//! let prior = Value::from(json!({ "items": [], "meta": { "owner": "ann" } }));
//! let applied = apply(&prior, &Value::from("buy milk"), |draft, payload| {
//!     draft.field("items")?.push(payload.clone())?;
//!     Ok(None)
//! })
//! .unwrap();
//!
//! assert!(applied.mutated);
//! assert_eq!(applied.value.get_path(&["items", "0"]), Some(&Value::from("buy milk")));
//! assert_eq!(prior.get_path(&["items", "0"]), None);
//! assert!(prior.get("meta").unwrap().ptr_eq(applied.value.get("meta").unwrap()));
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::DraftError;
use crate::value::Value;

/// Result a handler hands back to the engine.
///
/// `None` keeps the draft; `Some(value)` replaces the whole scoped slice.
pub type HandlerResult = anyhow::Result<Option<Value>>;

/// Finalized output of [`apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The new scoped value.
    pub value: Value,
    /// Whether the handler wrote to the draft or returned a differing value.
    pub mutated: bool,
}

/// Why a handler did not produce a value.
#[derive(Debug)]
pub enum HandlerFailure {
    Failed(anyhow::Error),
    Panicked(String),
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerFailure::Failed(err) => write!(f, "{err:#}"),
            HandlerFailure::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

/// Run `handler` against a draft of `prior` and finalize the result.
///
/// `prior` is only ever read. A panic inside the handler is caught and
/// reported as [`HandlerFailure::Panicked`].
pub fn apply<F>(prior: &Value, payload: &Value, handler: F) -> Result<Applied, HandlerFailure>
where
    F: FnOnce(&mut Draft<'_>, &Value) -> HandlerResult,
{
    let mut draft = Draft::new(prior);
    let produced = catch_unwind(AssertUnwindSafe(|| handler(&mut draft, payload)));

    match produced {
        Ok(Ok(None)) => Ok(draft.finish()),
        Ok(Ok(Some(replacement))) => {
            let mutated = replacement != *prior;
            Ok(Applied {
                value: replacement,
                mutated,
            })
        }
        Ok(Err(err)) => Err(HandlerFailure::Failed(err)),
        Err(panic) => Err(HandlerFailure::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One step from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

fn display_path(path: &[Step]) -> String {
    let mut out = String::from("$");
    for step in path {
        match step {
            Step::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            Step::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

/// Read-only walk. Errors name the first step that does not resolve.
fn resolve<'v>(root: &'v Value, path: &[Step]) -> Result<&'v Value, DraftError> {
    let mut current = root;
    for (depth, step) in path.iter().enumerate() {
        let here = &path[..depth];
        current = match (current, step) {
            (Value::Map(map), Step::Key(key)) => {
                map.get(key).ok_or_else(|| DraftError::MissingKey {
                    path: display_path(here),
                    key: key.clone(),
                })?
            }
            (Value::List(items), Step::Index(index)) => {
                items.get(*index).ok_or(DraftError::IndexOutOfBounds {
                    path: display_path(here),
                    index: *index,
                    len: items.len(),
                })?
            }
            (other, Step::Key(_)) => {
                return Err(DraftError::TypeMismatch {
                    path: display_path(here),
                    expected: "map",
                    found: other.kind(),
                })
            }
            (other, Step::Index(_)) => {
                return Err(DraftError::TypeMismatch {
                    path: display_path(here),
                    expected: "list",
                    found: other.kind(),
                })
            }
        };
    }
    Ok(current)
}

/// Copy-on-write walk. Callers validate with [`resolve`] first so nothing is
/// cloned for a path that turns out not to exist.
fn resolve_mut<'v>(root: &'v mut Value, path: &[Step]) -> Result<&'v mut Value, DraftError> {
    let mut current = root;
    for (depth, step) in path.iter().enumerate() {
        let here = || display_path(&path[..depth]);
        current = match (current, step) {
            (Value::Map(map), Step::Key(key)) => {
                Arc::make_mut(map)
                    .get_mut(key)
                    .ok_or_else(|| DraftError::MissingKey {
                        path: here(),
                        key: key.clone(),
                    })?
            }
            (Value::List(items), Step::Index(index)) => {
                let len = items.len();
                Arc::make_mut(items)
                    .get_mut(*index)
                    .ok_or_else(|| DraftError::IndexOutOfBounds {
                        path: here(),
                        index: *index,
                        len,
                    })?
            }
            (other, step) => {
                return Err(DraftError::TypeMismatch {
                    path: here(),
                    expected: match step {
                        Step::Key(_) => "map",
                        Step::Index(_) => "list",
                    },
                    found: other.kind(),
                })
            }
        };
    }
    Ok(current)
}

/// The mutable view of a scoped slice handed to a handler.
///
/// Most edits go through [`Draft::root`] or the shortcuts that delegate to it
/// (`set`, `push`, `field`, ...). The prior value stays reachable through
/// [`Draft::original`] for inspection.
pub struct Draft<'a> {
    base: &'a Value,
    working: Value,
    touched: bool,
}

impl<'a> Draft<'a> {
    /// Start a draft over `base`. The working copy shares all of `base`.
    pub fn new(base: &'a Value) -> Self {
        Self {
            base,
            working: base.clone(),
            touched: false,
        }
    }

    /// The value the draft started from. Never affected by edits.
    pub fn original(&self) -> &'a Value {
        self.base
    }

    /// The value including edits so far.
    pub fn current(&self) -> &Value {
        &self.working
    }

    /// Whether any edit has been recorded.
    pub fn is_modified(&self) -> bool {
        self.touched
    }

    /// Read a key of the current (edited) root map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.working.get(key)
    }

    /// Cursor at the root of the slice.
    pub fn root(&mut self) -> Cursor<'_> {
        Cursor {
            root: &mut self.working,
            path: Vec::new(),
            touched: &mut self.touched,
        }
    }

    /// Cursor at a key of the root map.
    pub fn field(&mut self, key: &str) -> Result<Cursor<'_>, DraftError> {
        self.root().into_field(key)
    }

    /// Cursor at a nested path of map keys and list indices.
    pub fn at(&mut self, path: &[&str]) -> Result<Cursor<'_>, DraftError> {
        self.root().into_at(path)
    }

    /// Assign a key on the root map.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<Option<Value>, DraftError> {
        self.root().set(key, value)
    }

    /// Remove a key from the root map.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, DraftError> {
        self.root().remove(key)
    }

    /// Append to the root list.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), DraftError> {
        self.root().push(value)
    }

    /// Replace the whole slice from inside the draft.
    pub fn replace(&mut self, value: impl Into<Value>) -> Result<Value, DraftError> {
        self.root().replace(value)
    }

    fn finish(self) -> Applied {
        Applied {
            value: self.working,
            mutated: self.touched,
        }
    }
}

impl fmt::Debug for Draft<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft")
            .field("original", self.base)
            .field("current", &self.working)
            .field("modified", &self.touched)
            .finish()
    }
}

/// A position inside a draft.
///
/// Creating a cursor copies nothing; the first write through it copies the
/// containers between the draft root and the cursor position.
pub struct Cursor<'d> {
    root: &'d mut Value,
    path: Vec<Step>,
    touched: &'d mut bool,
}

impl<'d> Cursor<'d> {
    /// Current value at this position.
    pub fn value(&self) -> Result<&Value, DraftError> {
        resolve(&*self.root, &self.path)
    }

    /// Read a key of the map at this position.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value().ok().and_then(|v| v.get(key))
    }

    /// Length of the list or map at this position.
    pub fn len(&self) -> Result<usize, DraftError> {
        match self.value()? {
            Value::List(items) => Ok(items.len()),
            Value::Map(map) => Ok(map.len()),
            other => Err(self.mismatch("list or map", other)),
        }
    }

    pub fn is_empty(&self) -> Result<bool, DraftError> {
        self.len().map(|len| len == 0)
    }

    /// Path of this cursor, `$` being the draft root.
    pub fn path(&self) -> String {
        display_path(&self.path)
    }

    /// Child cursor at `key`, borrowing this one.
    pub fn field(&mut self, key: &str) -> Result<Cursor<'_>, DraftError> {
        let path = self.child_path(Step::Key(key.to_string()))?;
        Ok(Cursor {
            root: &mut *self.root,
            path,
            touched: &mut *self.touched,
        })
    }

    /// Child cursor at list position `index`, borrowing this one.
    pub fn index(&mut self, index: usize) -> Result<Cursor<'_>, DraftError> {
        let path = self.child_path(Step::Index(index))?;
        Ok(Cursor {
            root: &mut *self.root,
            path,
            touched: &mut *self.touched,
        })
    }

    /// Move this cursor to `key`.
    pub fn into_field(mut self, key: &str) -> Result<Cursor<'d>, DraftError> {
        self.path = self.child_path(Step::Key(key.to_string()))?;
        Ok(self)
    }

    /// Move this cursor to list position `index`.
    pub fn into_index(mut self, index: usize) -> Result<Cursor<'d>, DraftError> {
        self.path = self.child_path(Step::Index(index))?;
        Ok(self)
    }

    /// Move this cursor along `path`. Steps into lists are parsed as indices.
    pub fn into_at(mut self, path: &[&str]) -> Result<Cursor<'d>, DraftError> {
        for step in path {
            let next = match self.value()? {
                Value::List(_) => match step.parse::<usize>() {
                    Ok(index) => Step::Index(index),
                    Err(_) => {
                        return Err(DraftError::TypeMismatch {
                            path: self.path(),
                            expected: "map",
                            found: "list",
                        })
                    }
                },
                _ => Step::Key((*step).to_string()),
            };
            self.path = self.child_path(next)?;
        }
        Ok(self)
    }

    /// Assign `key` on the map at this position. Returns the previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<Option<Value>, DraftError> {
        self.expect_map()?;
        let map = self.map_mut()?;
        let previous = Arc::make_mut(map).insert(key.to_string(), value.into());
        *self.touched = true;
        Ok(previous)
    }

    /// Remove `key` from the map at this position.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, DraftError> {
        let present = match self.value()? {
            Value::Map(map) => map.contains_key(key),
            other => return Err(self.mismatch("map", other)),
        };
        if !present {
            return Ok(None);
        }
        let map = self.map_mut()?;
        let removed = Arc::make_mut(map).remove(key);
        *self.touched = true;
        Ok(removed)
    }

    /// Append to the list at this position.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), DraftError> {
        self.expect_list()?;
        let items = self.list_mut()?;
        Arc::make_mut(items).push(value.into());
        *self.touched = true;
        Ok(())
    }

    /// Remove and return the last element of the list at this position.
    pub fn pop(&mut self) -> Result<Option<Value>, DraftError> {
        if self.expect_list()? == 0 {
            return Ok(None);
        }
        let items = self.list_mut()?;
        let popped = Arc::make_mut(items).pop();
        *self.touched = true;
        Ok(popped)
    }

    /// Insert into the list at this position; `index` may equal the length.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<(), DraftError> {
        let len = self.expect_list()?;
        if index > len {
            return Err(DraftError::IndexOutOfBounds {
                path: self.path(),
                index,
                len,
            });
        }
        let items = self.list_mut()?;
        Arc::make_mut(items).insert(index, value.into());
        *self.touched = true;
        Ok(())
    }

    /// Remove the element at `index` of the list at this position.
    pub fn remove_at(&mut self, index: usize) -> Result<Value, DraftError> {
        let len = self.expect_list()?;
        if index >= len {
            return Err(DraftError::IndexOutOfBounds {
                path: self.path(),
                index,
                len,
            });
        }
        let items = self.list_mut()?;
        let removed = Arc::make_mut(items).remove(index);
        *self.touched = true;
        Ok(removed)
    }

    /// Keep only the list elements matching `keep`. Copies nothing if every
    /// element is kept.
    pub fn retain<F>(&mut self, mut keep: F) -> Result<usize, DraftError>
    where
        F: FnMut(&Value) -> bool,
    {
        let doomed = match self.value()? {
            Value::List(items) => items.iter().filter(|item| !keep(item)).count(),
            other => return Err(self.mismatch("list", other)),
        };
        if doomed == 0 {
            return Ok(0);
        }
        let items = self.list_mut()?;
        Arc::make_mut(items).retain(|item| keep(item));
        *self.touched = true;
        Ok(doomed)
    }

    /// Append every value of `values` to the list at this position.
    pub fn extend<I>(&mut self, values: I) -> Result<(), DraftError>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.expect_list()?;
        let mut values = values.into_iter().peekable();
        if values.peek().is_none() {
            return Ok(());
        }
        let items = self.list_mut()?;
        Arc::make_mut(items).extend(values.map(Into::<Value>::into));
        *self.touched = true;
        Ok(())
    }

    /// Empty the list or map at this position.
    pub fn clear(&mut self) -> Result<(), DraftError> {
        if self.len()? == 0 {
            return Ok(());
        }
        match self.slot()? {
            Value::List(items) => Arc::make_mut(items).clear(),
            Value::Map(map) => Arc::make_mut(map).clear(),
            _ => {}
        }
        *self.touched = true;
        Ok(())
    }

    /// Overwrite the value at this position. Returns what was there.
    pub fn replace(&mut self, value: impl Into<Value>) -> Result<Value, DraftError> {
        let previous = std::mem::replace(self.slot()?, value.into());
        *self.touched = true;
        Ok(previous)
    }

    /// Apply `f` to the value at this position and store its result.
    pub fn update<F>(&mut self, f: F) -> Result<(), DraftError>
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(self.value()?);
        self.replace(next)?;
        Ok(())
    }

    fn child_path(&self, step: Step) -> Result<Vec<Step>, DraftError> {
        let mut path = self.path.clone();
        path.push(step);
        resolve(&*self.root, &path)?;
        Ok(path)
    }

    fn slot(&mut self) -> Result<&mut Value, DraftError> {
        resolve(&*self.root, &self.path)?;
        resolve_mut(&mut *self.root, &self.path)
    }

    fn map_mut(&mut self) -> Result<&mut Arc<crate::value::Map>, DraftError> {
        let path = self.path();
        match self.slot()? {
            Value::Map(map) => Ok(map),
            other => Err(DraftError::TypeMismatch {
                path,
                expected: "map",
                found: other.kind(),
            }),
        }
    }

    fn list_mut(&mut self) -> Result<&mut Arc<Vec<Value>>, DraftError> {
        let path = self.path();
        match self.slot()? {
            Value::List(items) => Ok(items),
            other => Err(DraftError::TypeMismatch {
                path,
                expected: "list",
                found: other.kind(),
            }),
        }
    }

    fn expect_map(&self) -> Result<usize, DraftError> {
        match self.value()? {
            Value::Map(map) => Ok(map.len()),
            other => Err(self.mismatch("map", other)),
        }
    }

    fn expect_list(&self) -> Result<usize, DraftError> {
        match self.value()? {
            Value::List(items) => Ok(items.len()),
            other => Err(self.mismatch("list", other)),
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> DraftError {
        DraftError::TypeMismatch {
            path: self.path(),
            expected,
            found: found.kind(),
        }
    }
}
