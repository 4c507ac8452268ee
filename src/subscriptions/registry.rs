//! Registry of active listeners.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::types::{CancelFn, ListenerId, SubscriptionInfo, SubscriptionKind};

/// Internal listener state.
struct Listener {
    topic: String,
    kind: SubscriptionKind,
    cancel: CancelFn,
}

impl Listener {
    /// Run the cancel handle. Failures are logged, never propagated.
    fn close(self, id: ListenerId) -> bool {
        match (self.cancel)() {
            Ok(()) => {
                tracing::debug!(listener_id = %id, topic = %self.topic, "listener closed");
                true
            }
            Err(e) => {
                tracing::warn!(
                    listener_id = %id,
                    topic = %self.topic,
                    error = %e,
                    "listener cancel failed"
                );
                false
            }
        }
    }
}

/// Owns every active subscription's cancel handle.
///
/// Entries are created only after the native listener attached, so a
/// registered listener is always active. Removing an entry and running its
/// cancel handle happen together, which makes teardown exactly-once.
pub struct ListenerRegistry {
    /// Active listeners by ID.
    listeners: RwLock<HashMap<ListenerId, Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register an attached listener under a fresh id.
    pub fn register(
        &self,
        topic: impl Into<String>,
        kind: SubscriptionKind,
        cancel: CancelFn,
    ) -> ListenerId {
        let topic = topic.into();
        let mut listeners = self.listeners.write();

        let mut id = ListenerId::new();
        while listeners.contains_key(&id) {
            id = ListenerId::new();
        }

        tracing::debug!(listener_id = %id, topic = %topic, ?kind, "listener registered");
        listeners.insert(id, Listener { topic, kind, cancel });
        id
    }

    /// Remove a listener and cancel it.
    ///
    /// Unknown ids are a no-op. Returns true if a listener was removed.
    pub fn unregister(&self, id: ListenerId) -> bool {
        // Cancel outside the lock so a slow cancel doesn't block the map.
        let removed = self.listeners.write().remove(&id);
        match removed {
            Some(listener) => {
                listener.close(id);
                true
            }
            None => {
                tracing::debug!(listener_id = %id, "unregister of unknown listener ignored");
                false
            }
        }
    }

    /// Cancel every listener. Returns how many were removed.
    pub fn unregister_all(&self) -> usize {
        let drained: Vec<(ListenerId, Listener)> = self.listeners.write().drain().collect();
        let count = drained.len();

        let failed = drained
            .into_iter()
            .map(|(id, listener)| listener.close(id))
            .filter(|closed| !closed)
            .count();

        if count > 0 {
            tracing::debug!(count, failed, "all listeners unregistered");
        }
        count
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Snapshot of active listeners.
    pub fn list(&self) -> Vec<SubscriptionInfo> {
        self.listeners
            .read()
            .iter()
            .map(|(id, l)| SubscriptionInfo {
                id: *id,
                topic: l.topic.clone(),
                kind: l.kind,
            })
            .collect()
    }

    /// Topic of a listener.
    pub fn topic(&self, id: ListenerId) -> Option<String> {
        self.listeners.read().get(&id).map(|l| l.topic.clone())
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_cancel(counter: &Arc<AtomicUsize>) -> CancelFn {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_register_unregister() {
        let registry = ListenerRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        let id = registry.register("users", SubscriptionKind::Collection, counting_cancel(&cancels));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(id));
        assert_eq!(registry.topic(id).as_deref(), Some("users"));

        assert!(registry.unregister(id));
        assert!(registry.is_empty());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_twice_cancels_once() {
        let registry = ListenerRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        let id = registry.register("doc", SubscriptionKind::Document, counting_cancel(&cancels));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry = ListenerRegistry::new();
        assert!(!registry.unregister(ListenerId::new()));
    }

    #[test]
    fn test_unregister_all_cancels_each_once() {
        let registry = ListenerRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        for i in 0..25 {
            registry.register(format!("t{}", i), SubscriptionKind::Collection, counting_cancel(&cancels));
        }

        assert_eq!(registry.unregister_all(), 25);
        assert_eq!(registry.unregister_all(), 0);
        assert_eq!(cancels.load(Ordering::SeqCst), 25);
    }

    #[test]
    fn test_failing_cancel_doesnt_block_others() {
        let registry = ListenerRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));

        registry.register("a", SubscriptionKind::Document, counting_cancel(&cancels));
        registry.register(
            "stuck",
            SubscriptionKind::Document,
            Box::new(|| -> crate::error::Result<()> {
                Err(BridgeError::Stream("listener already gone".into()))
            }),
        );
        registry.register("b", SubscriptionKind::Document, counting_cancel(&cancels));

        assert_eq!(registry.unregister_all(), 3);
        assert!(registry.is_empty());
        assert_eq!(cancels.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_cancels_remaining() {
        let cancels = Arc::new(AtomicUsize::new(0));
        {
            let registry = ListenerRegistry::new();
            registry.register("a", SubscriptionKind::PathExplorer, counting_cancel(&cancels));
        }
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_list() {
        let registry = ListenerRegistry::new();
        let cancels = Arc::new(AtomicUsize::new(0));
        let id = registry.register("nav", SubscriptionKind::PathExplorer, counting_cancel(&cancels));

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].kind, SubscriptionKind::PathExplorer);
    }
}
