//! Data Loaders
//!
//! A data loader starts watching a data source for one set of props and
//! reports back through a [`ResultCallback`]. It may call back zero, one or
//! many times, synchronously or from another task. What it returns is the
//! way to stop watching.

use std::fmt;

use crate::container::ResultCallback;
use crate::error::Result;
use crate::options::Context;
use crate::props::Props;

/// Releases everything one loader invocation acquired.
pub struct Stop(Box<dyn FnOnce() + Send>);

impl Stop {
    pub fn new<F>(stop: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(stop))
    }

    pub fn stop(self) {
        (self.0)()
    }
}

impl fmt::Debug for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Stop")
    }
}

/// What a loader invocation returns: an optional way to stop it.
pub type LoadResult = Result<Option<Stop>>;

/// Starts a subscription for one set of props.
///
/// Implemented for every `Fn(&Props, ResultCallback, &Context) -> LoadResult`.
pub trait DataLoader: Send + Sync + 'static {
    fn load(&self, props: &Props, callback: ResultCallback, context: &Context) -> LoadResult;
}

impl<F> DataLoader for F
where
    F: Fn(&Props, ResultCallback, &Context) -> LoadResult + Send + Sync + 'static,
{
    fn load(&self, props: &Props, callback: ResultCallback, context: &Context) -> LoadResult {
        self(props, callback, context)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
