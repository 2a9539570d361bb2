//! Host Integration
//!
//! The host UI framework drives containers through their lifecycle hooks and
//! supplies a [`Scheduler`] so post-mount state changes can be batched into
//! its own update cycle.
//!
//! [`Host`] is a minimal in-process host. It follows the ordering a
//! component framework guarantees:
//!
//! 1. mount: construct → render → did-mount
//! 2. props change: receive-props → should-update → commit → render
//! 3. state change: callbacks park state and schedule; [`Mounted::flush`]
//!    runs should-update → commit → render
//! 4. unmount: will-unmount
//!
//! It is enough to embed containers without a framework and is what the
//! test suites drive containers with.

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::trace;

use crate::component::{ChildInstance, Element};
use crate::compose::ContainerType;
use crate::container::{Container, ContainerId, ContainerState};
use crate::error::Result;
use crate::options::Context;
use crate::props::Props;

/// Receives "this container has new state" notifications from callbacks.
///
/// Called from whatever thread the loader delivers on, never with container
/// locks held.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, container: ContainerId);
}

/// A deduplicating queue of containers awaiting an update.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: Mutex<IndexSet<ContainerId>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued container, in scheduling order.
    pub fn drain(&self) -> Vec<ContainerId> {
        self.pending.lock().drain(..).collect()
    }

    /// Remove one container from the queue; returns whether it was queued.
    pub fn take(&self, container: ContainerId) -> bool {
        self.pending.lock().shift_remove(&container)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl Scheduler for UpdateQueue {
    fn schedule(&self, container: ContainerId) {
        self.pending.lock().insert(container);
    }
}

/// A minimal host owning one update queue.
#[derive(Debug, Default, Clone)]
pub struct Host {
    queue: Arc<UpdateQueue>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self) -> &Arc<UpdateQueue> {
        &self.queue
    }

    /// Construct, render and mount a container.
    pub fn mount(&self, container_type: &ContainerType, props: Props, context: Context) -> Result<Mounted> {
        let container = container_type.create(props, context, self.queue.clone())?;
        let mut mounted = Mounted {
            container,
            queue: self.queue.clone(),
            output: Element::Empty,
            renders: 0,
            skipped: 0,
        };
        mounted.render()?;
        mounted.container.did_mount();
        Ok(mounted)
    }
}

/// A container mounted by a [`Host`].
#[derive(Debug)]
pub struct Mounted {
    container: Container,
    queue: Arc<UpdateQueue>,
    output: Element,
    renders: usize,
    skipped: usize,
}

impl Mounted {
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The output of the last render.
    pub fn output(&self) -> &Element {
        &self.output
    }

    pub fn markup(&self) -> String {
        self.output.to_markup()
    }

    /// How many times the container has rendered.
    pub fn render_count(&self) -> usize {
        self.renders
    }

    /// How many candidate updates were skipped by `should_update`.
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn child(&self) -> Option<ChildInstance> {
        self.container.child()
    }

    /// Replace the props, keeping the context.
    pub fn set_props(&mut self, props: Props) -> Result<bool> {
        let context = self.container.context();
        self.update(props, context)
    }

    /// Replace the context, keeping the props.
    pub fn set_context(&mut self, context: Context) -> Result<bool> {
        let props = self.container.props();
        self.update(props, context)
    }

    /// Apply new props and context. Returns whether the container re-rendered.
    pub fn update(&mut self, props: Props, context: Context) -> Result<bool> {
        self.container.receive_props(&props, &context)?;
        self.queue.take(self.container.id());
        let state = self.next_state();
        self.apply(props, context, state)
    }

    /// Apply state parked by post-mount callbacks. Returns whether the
    /// container re-rendered.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.queue.take(self.container.id()) {
            return Ok(false);
        }
        let props = self.container.props();
        let context = self.container.context();
        let state = self.next_state();
        self.apply(props, context, state)
    }

    pub fn unmount(self) {
        self.container.will_unmount();
    }

    fn next_state(&self) -> ContainerState {
        self.container
            .take_pending_state()
            .unwrap_or_else(|| self.container.state())
    }

    fn apply(&mut self, props: Props, context: Context, state: ContainerState) -> Result<bool> {
        let render = self.container.should_update(&props, &context, &state);
        self.container.commit(props, context, state);
        if !render {
            self.skipped += 1;
            return Ok(false);
        }
        self.render()?;
        Ok(true)
    }

    fn render(&mut self) -> Result<()> {
        let output = self.container.render()?;
        match &output {
            Element::Component {
                component,
                props,
                child_ref: Some(child_ref),
            } => child_ref.attach(ChildInstance::new(component.display_name(), props.clone())),
            _ => self.container.child_ref().detach(),
        }
        self.renders += 1;
        trace!(container = %self.container.display_name(), renders = self.renders, "rendered");
        self.output = output;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
