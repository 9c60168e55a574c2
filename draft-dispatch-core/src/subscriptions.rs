//! Async sources and sinks around a store
//!
//! [`snapshot_stream`] turns published snapshots into a [`Stream`].
//! [`Subscriptions`] goes the other way: it keeps long-lived payload sources
//! (intervals, streams) that dispatch an action for every item.
//!
//! # Example
//!
//! ```ignore
//! use draft_dispatch::subscriptions::{snapshot_stream, Subscriptions};
//! use std::time::Duration;
//!
//! let mut subs = Subscriptions::new(store.clone());
//!
//! // Dispatch `clock.tick` every second
//! subs.interval("tick", Duration::from_secs(1), "clock.tick", || Value::Null)?;
//!
//! // Feed websocket messages into `chat.receive`
//! subs.stream("ws", "chat.receive", messages)?;
//!
//! let mut snapshots = snapshot_stream(&store);
//! while let Some(snapshot) = snapshots.next().await {
//!     render(&snapshot);
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::error::DispatchError;
use crate::middleware::Middleware;
use crate::store::{ActionHandle, Store};
use crate::value::Value;

/// Stream of published snapshots, starting with the current one.
pub fn snapshot_stream<M: Middleware + Send + 'static>(store: &Store<M>) -> WatchStream<Value> {
    WatchStream::new(store.watch())
}

/// Like [`snapshot_stream`], but only yields snapshots published after the call.
pub fn snapshot_changes<M: Middleware + Send + 'static>(store: &Store<M>) -> WatchStream<Value> {
    WatchStream::from_changes(store.watch())
}

/// Identifies a subscription for cancellation.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SubKey(String);

impl SubKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SubKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Manages long-lived sources that dispatch into a store.
///
/// Each source runs as a tokio task. Dispatch failures are logged and the
/// source keeps running. Dropping the manager aborts every source.
pub struct Subscriptions<M: Middleware + Send + 'static> {
    store: Store<M>,
    handles: HashMap<SubKey, JoinHandle<()>>,
}

impl<M: Middleware + Send + 'static> Subscriptions<M> {
    pub fn new(store: Store<M>) -> Self {
        Self {
            store,
            handles: HashMap::new(),
        }
    }

    /// Dispatch `action` every `period`, with a payload from `payload_fn`.
    ///
    /// The first dispatch happens after one period. A subscription with the
    /// same key is cancelled first.
    pub fn interval<F>(
        &mut self,
        key: impl Into<SubKey>,
        period: Duration,
        action: &str,
        payload_fn: F,
    ) -> Result<&mut Self, DispatchError>
    where
        F: Fn() -> Value + Send + 'static,
    {
        let key = key.into();
        let handle = self.resolve(action)?;
        self.cancel(&key);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first immediate tick
            interval.tick().await;
            loop {
                interval.tick().await;
                forward(&handle, payload_fn());
            }
        });

        self.handles.insert(key, task);
        Ok(self)
    }

    /// Dispatch `action` once per item of `stream`.
    ///
    /// A subscription with the same key is cancelled first.
    pub fn stream<S>(
        &mut self,
        key: impl Into<SubKey>,
        action: &str,
        stream: S,
    ) -> Result<&mut Self, DispatchError>
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        let key = key.into();
        let handle = self.resolve(action)?;
        self.cancel(&key);

        let task = tokio::spawn(async move {
            tokio::pin!(stream);
            while let Some(payload) = stream.next().await {
                forward(&handle, payload);
            }
        });

        self.handles.insert(key, task);
        Ok(self)
    }

    /// Cancel a subscription by key. No-op for unknown keys.
    pub fn cancel(&mut self, key: &SubKey) {
        if let Some(handle) = self.handles.remove(key) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    pub fn is_active(&self, key: &SubKey) -> bool {
        self.handles.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &SubKey> {
        self.handles.keys()
    }

    fn resolve(&self, action: &str) -> Result<ActionHandle<M>, DispatchError> {
        self.store
            .action(action)
            .ok_or_else(|| DispatchError::UnknownAction {
                action: action.to_string(),
            })
    }
}

impl<M: Middleware + Send + 'static> Drop for Subscriptions<M> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn forward<M: Middleware + Send + 'static>(handle: &ActionHandle<M>, payload: Value) {
    if let Err(err) = handle.dispatch(payload) {
        tracing::warn!(action = %handle.id(), error = %err, "Subscription dispatch failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::action;
    use crate::model::Model;

    fn counter() -> Store {
        Store::new(
            Model::new().state("total", 0).action(
                "add",
                action(|draft, payload| {
                    let by = payload.as_i64().unwrap_or(1);
                    draft
                        .field("total")?
                        .update(|v| Value::Int(v.as_i64().unwrap_or(0) + by))?;
                    Ok(None)
                }),
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_sub_key() {
        let k1 = SubKey::new("test");
        let k2: SubKey = "test".into();
        assert_eq!(k1, k2);
        assert_eq!(k1.name(), "test");
    }

    #[tokio::test]
    async fn test_stream_dispatches_each_item() {
        let store = counter();
        let mut changes = snapshot_changes(&store);
        let mut subs = Subscriptions::new(store.clone());

        subs.stream(
            "numbers",
            "add",
            tokio_stream::iter(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )
        .unwrap();

        let mut last = Value::Null;
        while last.get("total") != Some(&Value::Int(6)) {
            last = tokio::time::timeout(Duration::from_secs(1), changes.next())
                .await
                .expect("timeout")
                .expect("stream closed");
        }
        assert_eq!(store.select(&["total"]), Some(Value::Int(6)));
    }

    #[tokio::test]
    async fn test_interval_dispatches() {
        let store = counter();
        let mut changes = snapshot_changes(&store);
        let mut subs = Subscriptions::new(store.clone());

        subs.interval("tick", Duration::from_millis(10), "add", || Value::Int(1))
            .unwrap();
        assert!(subs.is_active(&SubKey::new("tick")));

        let snapshot = tokio::time::timeout(Duration::from_secs(1), changes.next())
            .await
            .expect("timeout")
            .expect("stream closed");
        assert!(snapshot.get("total").and_then(Value::as_i64).unwrap_or(0) >= 1);

        subs.cancel_all();
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_action_is_rejected() {
        let mut subs = Subscriptions::new(counter());
        let err = subs
            .stream("s", "missing", tokio_stream::iter(Vec::<Value>::new()))
            .err()
            .unwrap();
        assert!(matches!(err, DispatchError::UnknownAction { .. }));
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_stream_starts_with_current() {
        let store = counter();
        let mut snapshots = snapshot_stream(&store);
        let first = snapshots.next().await.unwrap();
        assert_eq!(first.get("total"), Some(&Value::Int(0)));
    }
}
