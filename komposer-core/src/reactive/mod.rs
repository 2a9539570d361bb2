//! Reactive Primitives
//!
//! This module implements the small reactive system the tracker adapter
//! runs loaders in: signals and autoruns.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (an autorun), the signal automatically
//! registers that context as a dependent. When the signal's value changes,
//! all dependents are notified.
//!
//! ## Autoruns
//!
//! An Autorun is a side-effecting computation that runs whenever its
//! dependencies change. A tracker-backed container is one autorun per
//! subscription.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency.

mod autorun;
mod context;
mod runtime;
mod signal;
mod subscriber;

pub use autorun::{Autorun, Cleanup};
pub use context::ReactiveContext;
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
pub use subscriber::{ListenerSet, SubscriberId};
