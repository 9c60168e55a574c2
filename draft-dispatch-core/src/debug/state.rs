//! Debug state introspection trait
//!
//! Provides a trait for state types to expose their contents as titled
//! key-value sections, plus implementations for snapshots, drafts and stores.

use std::fmt::Write as _;

use crate::draft::Draft;
use crate::middleware::Middleware;
use crate::store::Store;
use crate::value::Value;

/// A debug entry (key-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    pub key: String,
    pub value: String,
}

impl DebugEntry {
    /// Create a new entry
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A debug section with a title and entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSection {
    pub title: String,
    pub entries: Vec<DebugEntry>,
}

impl DebugSection {
    /// Create a new section
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    /// Add an entry to the section
    pub fn entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(DebugEntry::new(key, value));
        self
    }

    /// Add an entry (mutable)
    pub fn push_entry(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(DebugEntry::new(key, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }
}

/// Trait for types that can provide debug state information
///
/// # Example
///
/// ```
/// use draft_dispatch_core::debug::{DebugState, DebugSection};
///
/// struct Session {
///     user: String,
///     connected: bool,
/// }
///
/// impl DebugState for Session {
///     fn debug_sections(&self) -> Vec<DebugSection> {
///         vec![DebugSection::new("Session")
///             .entry("user", &self.user)
///             .entry("connected", self.connected.to_string())]
///     }
/// }
///
/// let text = Session { user: "ada".into(), connected: true }.render_debug();
/// assert!(text.contains("user: ada"));
/// ```
pub trait DebugState {
    /// Return state as sections with key-value pairs
    fn debug_sections(&self) -> Vec<DebugSection>;

    /// Render the sections as indented plain text.
    fn render_debug(&self) -> String {
        let mut out = String::new();
        for section in self.debug_sections() {
            let _ = writeln!(out, "[{}]", section.title);
            for entry in section.entries {
                let _ = writeln!(out, "  {}: {}", entry.key, entry.value);
            }
        }
        out
    }
}

/// Sections for a state tree: one per top-level map, flattened to dotted keys.
/// Top-level scalars and lists are gathered under `state`.
impl DebugState for Value {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let Some(root) = self.as_map() else {
            return vec![DebugSection::new("value").entry("$", self.to_string())];
        };

        let mut sections = Vec::new();
        let mut loose = DebugSection::new("state");
        for (key, child) in root.iter() {
            match child {
                Value::Map(_) => {
                    let mut section = DebugSection::new(key.as_str());
                    flatten_into(&mut section, "", child);
                    sections.push(section);
                }
                leaf => loose.push_entry(key.as_str(), leaf.to_string()),
            }
        }
        if !loose.entries.is_empty() {
            sections.insert(0, loose);
        }
        sections
    }
}

/// Shows the untouched prior value next to the in-progress one.
impl DebugState for Draft<'_> {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut original = DebugSection::new("Original");
        flatten_into(&mut original, "", self.original());
        let mut current = DebugSection::new("Current");
        flatten_into(&mut current, "", self.current());
        current.push_entry("(modified)", self.is_modified().to_string());
        vec![original, current]
    }
}

impl<M: Middleware + Send + 'static> DebugState for Store<M> {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut store = DebugSection::new("Store")
            .entry("name", &self.config().name)
            .entry("actions", self.registry().len().to_string());
        for id in self.actions() {
            let listeners = self.listeners_of(id.as_str());
            if !listeners.is_empty() {
                let names: Vec<&str> = listeners.iter().map(|l| l.as_str()).collect();
                store.push_entry(format!("{id} ->"), names.join(", "));
            }
        }

        let mut sections = vec![store];
        sections.extend(self.snapshot().debug_sections());
        sections
    }
}

fn flatten_into(section: &mut DebugSection, prefix: &str, value: &Value) {
    match value {
        Value::Map(map) if !map.is_empty() => {
            for (key, child) in map.iter() {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(section, &path, child);
            }
        }
        leaf => {
            let key = if prefix.is_empty() { "$" } else { prefix };
            section.push_entry(key, leaf.to_string());
        }
    }
}

/// Provides a basic fallback that renders the Debug output.
/// Types should implement DebugState directly for better formatting.
impl<T: std::fmt::Debug> DebugState for DebugWrapper<'_, T> {
    fn debug_sections(&self) -> Vec<DebugSection> {
        vec![DebugSection::new("Debug Output").entry("value", format!("{:#?}", self.0))]
    }
}

/// Wrapper to use Debug impl as DebugState
///
/// ```
/// use draft_dispatch_core::debug::{DebugState, DebugWrapper};
///
/// #[derive(Debug)]
/// struct MyState { x: i32 }
///
/// let state = MyState { x: 42 };
/// let sections = DebugWrapper(&state).debug_sections();
/// ```
pub struct DebugWrapper<'a, T>(pub &'a T);

/// Implementation for unit type (no state to show)
impl DebugState for () {
    fn debug_sections(&self) -> Vec<DebugSection> {
        vec![]
    }
}

/// Implementation for tuples - combine multiple state sources
impl<A: DebugState, B: DebugState> DebugState for (A, B) {
    fn debug_sections(&self) -> Vec<DebugSection> {
        let mut sections = self.0.debug_sections();
        sections.extend(self.1.debug_sections());
        sections
    }
}

impl<T: DebugState + ?Sized> DebugState for &T {
    fn debug_sections(&self) -> Vec<DebugSection> {
        (**self).debug_sections()
    }
}
