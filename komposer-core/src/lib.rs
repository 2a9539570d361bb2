//! Komposer Core
//!
//! Higher-order containers that keep a component fed with data from a
//! subscription. A container watches its props, (re)subscribes a data loader
//! when the watched props change, and renders the wrapped component with the
//! loaded data, a loading placeholder, or an error.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `compose`: `compose`, the composer and the container component type
//! - `container`: the per-instance lifecycle and the result callback
//! - `host`: the scheduler seam and a minimal host that drives containers
//! - `policy`: when to resubscribe and when to re-render
//! - `adapters`: composers for signals, futures, streams and stores
//! - `reactive`: signals and autoruns backing the tracker adapter
//!
//! # Example
//!
//! ```rust,ignore
//! use komposer_core::{compose, ComposeOptions, Context, Element, Host, Props, Renderable, ResultCallback};
//!
//! let container = compose(
//!     |props: &Props, callback: ResultCallback, _: &Context| {
//!         let name = props.get_str("name").unwrap_or("stranger");
//!         callback.data(Props::new().with("greeting", format!("hi {name}")))?;
//!         Ok(None)
//!     },
//!     ComposeOptions::new().props_to_watch(["name"]),
//! )
//! .wrap(Renderable::function("Greeting", |props: &Props| {
//!     Element::text(props.get_str("greeting").unwrap_or_default())
//! }))?;
//!
//! let mounted = Host::new().mount(&container, Props::new().with("name", "ana"), Context::new())?;
//! assert_eq!(mounted.markup(), "hi ana");
//! ```

pub mod adapters;
pub mod component;
pub mod compose;
pub mod container;
pub mod error;
pub mod host;
pub mod loader;
pub mod options;
pub mod policy;
pub mod props;
pub mod reactive;

pub use adapters::{compose_with_future, compose_with_store, compose_with_stream, compose_with_tracker, Store};
pub use component::{ChildInstance, ChildRef, ComponentClass, Element, Renderable, Statics};
pub use compose::{compose, compose_all, make_composer, ComposerFactory, Composer, ContainerType};
pub use container::{Container, ContainerId, ContainerState, ResultCallback, SubscriptionPhase};
pub use error::{ComposeError, DataError, LoadError, Result};
pub use host::{Host, Mounted, Scheduler, UpdateQueue};
pub use loader::{DataLoader, LoadResult, Stop};
pub use options::{ComposeConfig, ComposeOptions, Context, WatchList};
pub use props::{PropValue, Props};
