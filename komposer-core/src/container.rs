//! Container Lifecycle
//!
//! A [`Container`] is one live instance of a composed component. It owns at
//! most one data-loader subscription at a time and keeps it in step with the
//! host's lifecycle:
//!
//! ```text
//!   create ──► Loading ──► Ready | Failed ──► (receive_props) ──► ...
//!                                                   │
//!                                   will_unmount ──►└──► Stopped
//! ```
//!
//! # State Delivery
//!
//! Loader callbacks write state in one of two ways. Before the host has
//! mounted the container they write the committed state directly, so the very
//! first render already sees them. After mount they park the state as
//! *pending* and ask the host's [`Scheduler`] for an update; the host applies
//! it through the normal update path (`should_update`, `commit`, `render`).
//! State that lands after the first render but before `did_mount` is moved
//! to pending and scheduled when the host mounts.
//!
//! # Generations
//!
//! Every subscription is tagged with a generation number. A callback whose
//! generation is no longer current belongs to a subscription that has been
//! replaced, and is ignored. A callback arriving after unmount is a bug in the
//! loader and fails with [`ComposeError::InvariantViolation`].
//!
//! # Locking
//!
//! The lifecycle lock is never held while calling out: loaders, stop
//! functions, handlers, predicates and the scheduler all run unlocked, so a
//! loader may call back synchronously.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::component::{ChildInstance, ChildRef, Element};
use crate::compose::ContainerSpec;
use crate::error::{ComposeError, LoadError, Result};
use crate::host::Scheduler;
use crate::loader::Stop;
use crate::options::Context;
use crate::policy::Snapshot;
use crate::props::Props;

/// Unique identifier for a container instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(u64);

impl ContainerId {
    /// Generate a new unique container ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The data/error state a container renders from.
#[derive(Debug, Clone, Default)]
pub struct ContainerState {
    pub data: Option<Props>,
    pub error: Option<LoadError>,
}

impl ContainerState {
    /// Neither data nor error has arrived.
    pub fn is_loading(&self) -> bool {
        self.error.is_none() && self.data.is_none()
    }

    /// Identity comparison of the errors.
    pub fn same_error(&self, other: &ContainerState) -> bool {
        match (&self.error, &other.error) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const (),
            _ => false,
        }
    }
}

/// Where a container stands in its subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    /// No subscription has been started.
    Unsubscribed,
    /// Subscribed, waiting for data.
    Loading,
    /// Subscribed with data.
    Ready,
    /// Subscribed with an error.
    Failed,
    /// Unmounted; no further state is accepted.
    Stopped,
}

struct Lifecycle {
    props: Props,
    context: Context,
    state: ContainerState,
    pending: Option<ContainerState>,
    mounted: bool,
    unmounted: bool,
    stop: Option<Stop>,
    watched: Option<Props>,
    generation: u64,
    /// Bumped on every write to `state`.
    state_version: u64,
    /// The state and version the last render saw.
    rendered: (u64, ContainerState),
}

struct Shared {
    id: ContainerId,
    spec: Arc<ContainerSpec>,
    scheduler: Arc<dyn Scheduler>,
    child_ref: ChildRef,
    lifecycle: Mutex<Lifecycle>,
}

/// A live container instance.
pub struct Container {
    shared: Arc<Shared>,
}

impl Container {
    /// Construct a container and start its first subscription.
    pub(crate) fn new(
        spec: Arc<ContainerSpec>,
        props: Props,
        context: Context,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        let container = Self {
            shared: Arc::new(Shared {
                id: ContainerId::new(),
                spec,
                scheduler,
                child_ref: ChildRef::new(),
                lifecycle: Mutex::new(Lifecycle {
                    props: props.clone(),
                    context: context.clone(),
                    state: ContainerState::default(),
                    pending: None,
                    mounted: false,
                    unmounted: false,
                    stop: None,
                    watched: None,
                    generation: 0,
                    state_version: 0,
                    rendered: (0, ContainerState::default()),
                }),
            }),
        };

        debug!(
            container = %container.display_name(),
            id = %container.id(),
            "constructing container"
        );
        container.subscribe(&props, &context)?;
        Ok(container)
    }

    pub fn id(&self) -> ContainerId {
        self.shared.id
    }

    pub fn display_name(&self) -> &str {
        &self.shared.spec.display_name
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.shared.lifecycle.lock()
    }

    /// The committed props.
    pub fn props(&self) -> Props {
        self.lock().props.clone()
    }

    /// The committed host context.
    pub fn context(&self) -> Context {
        self.lock().context.clone()
    }

    /// The committed state. Pending post-mount updates are not included.
    pub fn state(&self) -> ContainerState {
        self.lock().state.clone()
    }

    pub fn phase(&self) -> SubscriptionPhase {
        let lifecycle = self.lock();
        if lifecycle.unmounted {
            return SubscriptionPhase::Stopped;
        }
        if lifecycle.generation == 0 {
            return SubscriptionPhase::Unsubscribed;
        }
        let state = lifecycle.pending.as_ref().unwrap_or(&lifecycle.state);
        if state.error.is_some() {
            SubscriptionPhase::Failed
        } else if state.data.is_some() {
            SubscriptionPhase::Ready
        } else {
            SubscriptionPhase::Loading
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.lock().mounted
    }

    /// The live child, once the host has committed a render with a ref.
    pub fn child(&self) -> Option<ChildInstance> {
        self.shared.child_ref.get()
    }

    pub(crate) fn child_ref(&self) -> &ChildRef {
        &self.shared.child_ref
    }

    /// Host hook: the container has been mounted.
    ///
    /// State delivered between the first render and this call has not been
    /// rendered yet; it is replayed as a scheduled update.
    pub fn did_mount(&self) {
        let replay = {
            let mut lifecycle = self.lock();
            lifecycle.mounted = true;
            let (rendered_version, rendered_state) = lifecycle.rendered.clone();
            if lifecycle.state_version == rendered_version || lifecycle.pending.is_some() {
                false
            } else {
                let delivered = std::mem::replace(&mut lifecycle.state, rendered_state);
                lifecycle.pending = Some(delivered);
                true
            }
        };

        trace!(container = %self.display_name(), replay, "mounted");
        if replay {
            self.shared.scheduler.schedule(self.shared.id);
        }
    }

    /// Host hook: new props and/or context are about to be committed.
    ///
    /// Restarts the loader when the re-subscription policy asks for it.
    pub fn receive_props(&self, props: &Props, context: &Context) -> Result<()> {
        self.subscribe(props, context)
    }

    /// Host hook: decide whether the candidate update re-renders.
    pub fn should_update(&self, props: &Props, context: &Context, state: &ContainerState) -> bool {
        let (current_props, current_context, current_state) = {
            let lifecycle = self.lock();
            (
                lifecycle.props.clone(),
                lifecycle.context.clone(),
                lifecycle.state.clone(),
            )
        };

        let decision = self.shared.spec.update_policy.should_update(
            Snapshot {
                props: &current_props,
                context: &current_context,
                state: &current_state,
            },
            Snapshot {
                props,
                context,
                state,
            },
        );
        trace!(container = %self.display_name(), decision, "update decision");
        decision
    }

    /// Host hook: take the state parked by post-mount callbacks.
    pub fn take_pending_state(&self) -> Option<ContainerState> {
        self.lock().pending.take()
    }

    /// Host hook: commit the props, context and state of an update.
    pub fn commit(&self, props: Props, context: Context, state: ContainerState) {
        let mut lifecycle = self.lock();
        lifecycle.props = props;
        lifecycle.context = context;
        lifecycle.state = state;
        lifecycle.state_version += 1;
    }

    /// Describe the output for the committed props and state.
    ///
    /// Errors win over data, missing data renders the loading handler. A data
    /// error with no configured handler fails the render.
    pub fn render(&self) -> Result<Element> {
        let (props, state) = {
            let mut lifecycle = self.lock();
            lifecycle.rendered = (lifecycle.state_version, lifecycle.state.clone());
            (lifecycle.props.clone(), lifecycle.state.clone())
        };
        let spec = &self.shared.spec;

        if let Some(error) = state.error {
            trace!(container = %spec.display_name, %error, "rendering error state");
            return match spec.options.get_error_handler() {
                Some(handler) => Ok(handler(&error)),
                None => Err(ComposeError::Unhandled {
                    container: spec.display_name.clone(),
                    source: error,
                }),
            };
        }

        let Some(data) = state.data else {
            trace!(container = %spec.display_name, "rendering loading state");
            return Ok(spec
                .options
                .get_loading_handler()
                .map_or(Element::Empty, |handler| handler(&props)));
        };

        Ok(Element::Component {
            component: spec.child.clone(),
            props: props.merged(&data),
            child_ref: spec
                .options
                .wants_ref()
                .then(|| self.shared.child_ref.clone()),
        })
    }

    /// Host hook: the container is going away. Stops the current
    /// subscription; later callbacks are protocol violations.
    pub fn will_unmount(&self) {
        let stop = {
            let mut lifecycle = self.lock();
            if lifecycle.unmounted {
                return;
            }
            lifecycle.unmounted = true;
            lifecycle.mounted = false;
            lifecycle.pending = None;
            lifecycle.stop.take()
        };

        debug!(container = %self.display_name(), id = %self.id(), "unmounting");
        if let Some(stop) = stop {
            stop.stop();
        }
        self.shared.child_ref.detach();
    }

    pub fn is_unmounted(&self) -> bool {
        self.lock().unmounted
    }

    fn subscribe(&self, props: &Props, context: &Context) -> Result<()> {
        let spec = &self.shared.spec;
        let (previous, generation) = {
            let mut lifecycle = self.lock();
            if lifecycle.unmounted {
                return Ok(());
            }
            if !spec
                .subscribe_policy
                .should_subscribe(&mut lifecycle.watched, props)
            {
                trace!(container = %spec.display_name, "watched props unchanged");
                return Ok(());
            }
            lifecycle.generation += 1;
            (lifecycle.stop.take(), lifecycle.generation)
        };

        if let Some(stop) = previous {
            debug!(container = %spec.display_name, generation = generation - 1, "unsubscribing");
            stop.stop();
        }

        let loader_context = match spec.options.get_env() {
            Some(env) => env.merged(context),
            None => context.clone(),
        };
        let callback = ResultCallback {
            container: Arc::downgrade(&self.shared),
            name: Arc::from(spec.display_name.as_str()),
            generation,
        };

        debug!(container = %spec.display_name, generation, "subscribing");
        let stop = spec.loader.load(props, callback, &loader_context)?;

        let mut lifecycle = self.lock();
        if lifecycle.unmounted || lifecycle.generation != generation {
            drop(lifecycle);
            if let Some(stop) = stop {
                stop.stop();
            }
        } else {
            lifecycle.stop = stop;
        }
        Ok(())
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if !self.is_unmounted() {
            self.will_unmount();
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.id())
            .field("display_name", &self.display_name())
            .field("phase", &self.phase())
            .finish()
    }
}

/// The callback a loader reports through.
///
/// Cheap to clone and safe to move to other threads or tasks. It holds the
/// container weakly: once the container is gone every call fails.
#[derive(Clone)]
pub struct ResultCallback {
    container: Weak<Shared>,
    name: Arc<str>,
    generation: u64,
}

impl ResultCallback {
    /// Deliver `(error, data)`. Both `None` means "loading".
    pub fn send(&self, error: Option<LoadError>, data: Option<Props>) -> Result<()> {
        if let Some(error) = &error {
            if error.to_string().is_empty() {
                return Err(ComposeError::InvariantViolation(format!(
                    "passed error to {} should carry a message",
                    self.name
                )));
            }
        }

        let unmounted = || {
            ComposeError::InvariantViolation(format!(
                "Trying to set data after component({}) has unmounted.",
                self.name
            ))
        };

        let shared = self.container.upgrade().ok_or_else(unmounted)?;
        let mut lifecycle = shared.lifecycle.lock();
        if lifecycle.unmounted {
            return Err(unmounted());
        }
        if lifecycle.generation != self.generation {
            debug!(
                container = %self.name,
                stale = self.generation,
                current = lifecycle.generation,
                "ignoring callback from a replaced subscription"
            );
            return Ok(());
        }

        let payload = ContainerState { data, error };
        trace!(container = %self.name, loading = payload.is_loading(), "callback");

        if !lifecycle.mounted {
            lifecycle.state = payload;
            lifecycle.state_version += 1;
            return Ok(());
        }

        lifecycle.pending = Some(payload);
        drop(lifecycle);
        shared.scheduler.schedule(shared.id);
        Ok(())
    }

    pub fn loading(&self) -> Result<()> {
        self.send(None, None)
    }

    pub fn data(&self, data: Props) -> Result<()> {
        self.send(None, Some(data))
    }

    pub fn error(&self, error: LoadError) -> Result<()> {
        self.send(Some(error), None)
    }

    /// Display name of the container this callback reports to.
    pub fn container_name(&self) -> &str {
        &self.name
    }

    /// Whether this callback still belongs to the live subscription.
    pub fn is_current(&self) -> bool {
        self.container.upgrade().is_some_and(|shared| {
            let lifecycle = shared.lifecycle.lock();
            !lifecycle.unmounted && lifecycle.generation == self.generation
        })
    }
}

impl fmt::Debug for ResultCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCallback")
            .field("container", &self.name)
            .field("generation", &self.generation)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Renderable;
    use crate::compose::compose;
    use crate::error::DataError;
    use crate::host::{Scheduler, UpdateQueue};
    use crate::options::ComposeOptions;
    use std::sync::atomic::AtomicUsize;

    fn comp() -> Renderable {
        Renderable::function("Comp", |_| Element::Empty)
    }

    fn queue() -> Arc<UpdateQueue> {
        Arc::new(UpdateQueue::new())
    }

    #[test]
    fn first_render_sees_pre_mount_data() {
        let container_type = compose(
            |_: &Props, callback: ResultCallback, _: &Context| {
                callback.data(Props::new().with("name", "arunoda"))?;
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let container = container_type
            .create(Props::new(), Context::new(), queue())
            .unwrap();
        assert_eq!(container.phase(), SubscriptionPhase::Ready);

        let element = container.render().unwrap();
        assert_eq!(element.props().unwrap().get_str("name"), Some("arunoda"));
    }

    #[test]
    fn post_mount_callback_is_parked_and_scheduled() {
        let slot: Arc<Mutex<Option<ResultCallback>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let container_type = compose(
            move |_: &Props, callback: ResultCallback, _: &Context| {
                *slot_clone.lock() = Some(callback);
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let updates = queue();
        let container = container_type
            .create(Props::new(), Context::new(), updates.clone())
            .unwrap();
        container.did_mount();
        assert_eq!(container.phase(), SubscriptionPhase::Loading);

        let callback = slot.lock().clone().unwrap();
        callback.data(Props::new().with("name", "kamal")).unwrap();

        assert!(container.state().data.is_none());
        assert_eq!(updates.drain(), vec![container.id()]);
        assert_eq!(container.phase(), SubscriptionPhase::Ready);

        let pending = container.take_pending_state().unwrap();
        assert_eq!(pending.data.unwrap().get_str("name"), Some("kamal"));
    }

    #[test]
    fn callback_after_unmount_is_rejected() {
        let slot: Arc<Mutex<Option<ResultCallback>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let container_type = compose(
            move |_: &Props, callback: ResultCallback, _: &Context| {
                *slot_clone.lock() = Some(callback);
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let container = container_type
            .create(Props::new(), Context::new(), queue())
            .unwrap();
        container.did_mount();
        container.will_unmount();
        assert_eq!(container.phase(), SubscriptionPhase::Stopped);

        let callback = slot.lock().clone().unwrap();
        let err = callback.data(Props::new().with("aa", 10)).unwrap_err();
        match err {
            ComposeError::InvariantViolation(message) => {
                assert!(message.contains("Trying to set data after"));
                assert!(message.contains("Container(Comp)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stale_generation_is_ignored() {
        let callbacks: Arc<Mutex<Vec<ResultCallback>>> = Arc::new(Mutex::new(Vec::new()));
        let callbacks_clone = callbacks.clone();
        let container_type = compose(
            move |_: &Props, callback: ResultCallback, _: &Context| {
                callbacks_clone.lock().push(callback);
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let container = container_type
            .create(Props::new().with("id", 1), Context::new(), queue())
            .unwrap();
        container
            .receive_props(&Props::new().with("id", 2), &Context::new())
            .unwrap();

        let (first, second) = {
            let callbacks = callbacks.lock();
            (callbacks[0].clone(), callbacks[1].clone())
        };
        assert!(!first.is_current());
        assert!(second.is_current());

        first.data(Props::new().with("from", "old")).unwrap();
        assert!(container.state().data.is_none());

        second.data(Props::new().with("from", "new")).unwrap();
        assert_eq!(
            container.state().data.unwrap().get_str("from"),
            Some("new")
        );
    }

    #[test]
    fn message_less_error_is_a_protocol_violation() {
        let container_type = compose(
            |_: &Props, callback: ResultCallback, _: &Context| {
                callback.error(DataError::shared(""))?;
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let err = container_type
            .create(Props::new(), Context::new(), queue())
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvariantViolation(_)));
    }

    #[test]
    fn dropping_a_container_stops_its_subscription() {
        let stops = Arc::new(AtomicUsize::new(0));
        let stops_clone = stops.clone();
        let container_type = compose(
            move |_: &Props, _: ResultCallback, _: &Context| {
                let stops = stops_clone.clone();
                Ok(Some(Stop::new(move || {
                    stops.fetch_add(1, Ordering::SeqCst);
                })))
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let container = container_type
            .create(Props::new(), Context::new(), queue())
            .unwrap();
        drop(container);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_error_handler_fails_the_render() {
        let container_type = compose(
            |_: &Props, callback: ResultCallback, _: &Context| {
                callback.error(DataError::shared("Aiyo"))?;
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let container = container_type
            .create(Props::new(), Context::new(), queue())
            .unwrap();
        assert_eq!(container.phase(), SubscriptionPhase::Failed);
        match container.render().unwrap_err() {
            ComposeError::Unhandled { container, source } => {
                assert_eq!(container, "Container(Comp)");
                assert_eq!(source.to_string(), "Aiyo");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn data_between_first_render_and_mount_is_replayed() {
        let slot: Arc<Mutex<Option<ResultCallback>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let container_type = compose(
            move |_: &Props, callback: ResultCallback, _: &Context| {
                *slot_clone.lock() = Some(callback);
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let updates = queue();
        let container = container_type
            .create(Props::new(), Context::new(), updates.clone())
            .unwrap();
        assert!(container.render().unwrap().is_empty());

        let callback = slot.lock().clone().unwrap();
        callback.data(Props::new().with("name", "ana")).unwrap();
        assert!(updates.is_empty());

        container.did_mount();
        assert_eq!(updates.drain(), vec![container.id()]);
        assert!(container.state().data.is_none());

        let pending = container.take_pending_state().unwrap();
        assert!(container.should_update(&Props::new(), &Context::new(), &pending));
        assert_eq!(pending.data.unwrap().get_str("name"), Some("ana"));
    }

    #[test]
    fn data_before_first_render_is_not_replayed() {
        let container_type = compose(
            |_: &Props, callback: ResultCallback, _: &Context| {
                callback.data(Props::new().with("name", "arunoda"))?;
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let updates = queue();
        let container = container_type
            .create(Props::new(), Context::new(), updates.clone())
            .unwrap();
        container.render().unwrap();
        container.did_mount();

        assert!(updates.is_empty());
        assert!(container.take_pending_state().is_none());
    }

    #[test]
    fn scheduler_is_not_called_before_mount() {
        struct Counting(AtomicUsize);
        impl Scheduler for Counting {
            fn schedule(&self, _: ContainerId) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let scheduler = Arc::new(Counting(AtomicUsize::new(0)));
        let container_type = compose(
            |_: &Props, callback: ResultCallback, _: &Context| {
                callback.loading()?;
                callback.data(Props::new())?;
                Ok(None)
            },
            ComposeOptions::new(),
        )
        .wrap(comp())
        .unwrap();

        let _container = container_type
            .create(Props::new(), Context::new(), scheduler.clone())
            .unwrap();
        assert_eq!(scheduler.0.load(Ordering::SeqCst), 0);
    }
}
