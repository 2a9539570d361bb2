//! Subscribers and listener sets.
//!
//! Signals and stores both keep a list of listeners to call when their value
//! changes. [`ListenerSet`] is that list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

/// Unique identifier for a subscriber.
///
/// Each subscriber (an autorun, a store listener) gets a unique ID when it is
/// registered. The ID is what unsubscribing and dependency tracking use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

/// Listeners notified on change.
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Arc<RwLock<SmallVec<[(SubscriberId, Listener); 4]>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; the returned ID removes it again.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Call every listener.
    ///
    /// Listeners run on a snapshot taken without the lock held, so a listener
    /// may subscribe or unsubscribe.
    pub fn notify(&self) {
        let snapshot: SmallVec<[Listener; 4]> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener();
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn listeners_are_notified_until_unsubscribed() {
        let set = ListenerSet::new();
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let id = set.subscribe(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        set.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(set.unsubscribe(id));
        assert!(!set.unsubscribe(id));
        set.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let set = ListenerSet::new();
        let slot = Arc::new(parking_lot::Mutex::new(None::<SubscriberId>));
        let slot_clone = slot.clone();
        let set_clone = set.clone();

        let id = set.subscribe(move || {
            if let Some(id) = *slot_clone.lock() {
                set_clone.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        set.notify();
        assert!(set.is_empty());
    }
}
