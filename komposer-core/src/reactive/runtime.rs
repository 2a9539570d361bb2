//! Reactive Runtime
//!
//! The runtime connects signals to the computations that read them. It
//! manages the dependency graph and re-runs computations when signals
//! change.
//!
//! # How It Works
//!
//! 1. When an autorun is created, it registers with the runtime.
//!
//! 2. When the autorun reads a signal, the runtime records the dependency.
//!
//! 3. When a signal's value changes, the runtime finds every live dependent
//!    and schedules it.
//!
//! # Thread Safety
//!
//! The reactive context is thread-local; the registry is global so signals
//! can be shared across threads. Registry shards are never locked while a
//! computation runs, so computations may read signals and re-register freely.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;

/// A computation that can be re-run when its dependencies change.
pub trait Reactive: Send + Sync {
    fn subscriber_id(&self) -> SubscriberId;

    /// Called when a dependency changed.
    fn schedule(&self);
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The global reactive runtime.
pub struct Runtime;

// Weak references so the registry never keeps a computation alive.
static REGISTRY: OnceLock<DashMap<SubscriberId, Weak<dyn Reactive>>> = OnceLock::new();
static SIGNAL_SUBSCRIBERS: OnceLock<DashMap<u64, IndexSet<SubscriberId>>> = OnceLock::new();

fn get_registry() -> &'static DashMap<SubscriberId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn get_signal_subscribers() -> &'static DashMap<u64, IndexSet<SubscriberId>> {
    SIGNAL_SUBSCRIBERS.get_or_init(DashMap::new)
}

impl Runtime {
    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped.
    pub fn register(reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();
        get_registry().insert(id, Arc::downgrade(&reactive));
        ReactiveHandle { subscriber_id: id }
    }

    fn unregister(id: SubscriberId) {
        get_registry().remove(&id);
        Self::clear_dependencies(id);
    }

    /// Record that a subscriber depends on a signal.
    pub fn add_dependency(signal_id: u64, subscriber_id: SubscriberId) {
        get_signal_subscribers()
            .entry(signal_id)
            .or_default()
            .insert(subscriber_id);
    }

    /// Remove all dependencies for a subscriber.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let subscribers = get_signal_subscribers();
        for mut entry in subscribers.iter_mut() {
            entry.value_mut().shift_remove(&subscriber_id);
        }
        subscribers.retain(|_, ids| !ids.is_empty());
    }

    /// Number of live subscribers depending on a signal.
    pub fn dependent_count(signal_id: u64) -> usize {
        get_signal_subscribers()
            .get(&signal_id)
            .map_or(0, |ids| ids.len())
    }

    /// Schedule every computation that depends on `signal_id`.
    pub fn notify_signal_change(signal_id: u64) {
        let subscriber_ids: Vec<SubscriberId> = match get_signal_subscribers().get(&signal_id) {
            Some(ids) => ids.iter().copied().collect(),
            None => return,
        };

        let dependents: Vec<Arc<dyn Reactive>> = subscriber_ids
            .into_iter()
            .filter_map(|id| get_registry().get(&id).and_then(|weak| weak.upgrade()))
            .collect();

        for reactive in dependents {
            reactive.schedule();
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
