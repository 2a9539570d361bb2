//! Re-subscription and Update Policies
//!
//! Two decisions are made on every property change:
//!
//! 1. [`SubscribePolicy`]: must the data loader be restarted?
//! 2. [`UpdatePolicy`]: must the container re-render?
//!
//! Both are pure functions of the options and the before/after snapshots, so
//! they live apart from the container's state machine.

use crate::container::ContainerState;
use crate::options::{ComposeOptions, Context, PropsPredicate, WatchList};
use crate::props::{shallow_eq_opt, Props};

/// Decides whether a property change restarts the loader.
#[derive(Clone)]
pub struct SubscribePolicy {
    watch: WatchList,
    predicate: Option<PropsPredicate>,
}

impl SubscribePolicy {
    pub fn new(watch: WatchList, predicate: Option<PropsPredicate>) -> Self {
        Self { watch, predicate }
    }

    pub fn from_options(options: &ComposeOptions) -> Self {
        Self::new(options.watch_list(), options.get_should_subscribe().cloned())
    }

    /// The watched projection of `props`.
    pub fn watched(&self, props: &Props) -> Props {
        match &self.watch {
            WatchList::All => props.clone(),
            WatchList::Only(keys) => props.pick(keys),
        }
    }

    /// Evaluate the policy against the cached projection.
    ///
    /// The cache always advances to the projection of `next`, whatever the
    /// outcome. An empty cache means this is the first run.
    pub fn should_subscribe(&self, cache: &mut Option<Props>, next: &Props) -> bool {
        let next_watched = self.watched(next);
        let Some(current) = cache.replace(next_watched.clone()) else {
            return true;
        };

        if let Some(predicate) = &self.predicate {
            return predicate(&current, &next_watched);
        }

        match &self.watch {
            WatchList::All => true,
            WatchList::Only(keys) if keys.is_empty() => false,
            WatchList::Only(_) => !current.shallow_eq(&next_watched),
        }
    }
}

/// Everything an update decision looks at.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub props: &'a Props,
    pub context: &'a Context,
    pub state: &'a ContainerState,
}

/// Decides whether a candidate update re-renders.
#[derive(Clone)]
pub struct UpdatePolicy {
    pure: bool,
    predicate: Option<PropsPredicate>,
}

impl UpdatePolicy {
    pub fn new(pure: bool, predicate: Option<PropsPredicate>) -> Self {
        Self { pure, predicate }
    }

    pub fn from_options(options: &ComposeOptions) -> Self {
        Self::new(options.is_pure(), options.get_should_update().cloned())
    }

    pub fn should_update(&self, current: Snapshot<'_>, next: Snapshot<'_>) -> bool {
        if let Some(predicate) = &self.predicate {
            return predicate(current.props, next.props);
        }

        if !self.pure {
            return true;
        }

        !current.props.shallow_eq(next.props)
            || !current.context.shallow_eq(next.context)
            || !current.state.same_error(next.state)
            || !shallow_eq_opt(current.state.data.as_ref(), next.state.data.as_ref())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
