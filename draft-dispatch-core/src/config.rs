//! Store configuration

/// Configuration for a [`Store`](crate::Store).
///
/// # Example
///
/// ```
/// use draft_dispatch_core::StoreConfig;
///
/// let config = StoreConfig::new("todos").max_cascade_depth(8).log_dispatches(false);
/// assert_eq!(config.name, "todos");
/// assert_eq!(config.max_cascade_depth, Some(8));
/// assert_eq!(StoreConfig::default().max_cascade_depth, None);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name used in tracing output.
    pub name: String,
    /// Deepest listener a single dispatch may run, counting the top-level
    /// action as depth 0. A listener past it is reported as a failure and its
    /// subtree skipped. `None` leaves cascades unbounded; the listener graph is
    /// acyclic, so every cascade still terminates.
    pub max_cascade_depth: Option<usize>,
    /// Emit a `debug` event per settled top-level dispatch.
    pub log_dispatches: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            max_cascade_depth: None,
            log_dispatches: true,
        }
    }
}

impl StoreConfig {
    /// Default config with a store name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = Some(depth);
        self
    }

    pub fn log_dispatches(mut self, enabled: bool) -> Self {
        self.log_dispatches = enabled;
        self
    }
}
