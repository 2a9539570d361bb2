//! Data Source Adapters
//!
//! Ready-made composers for the usual kinds of data source:
//!
//! - [`compose_with_tracker`]: a reactive computation over [`Signal`]s
//! - [`compose_with_future`]: a one-shot async load
//! - [`compose_with_stream`]: a stream of values
//! - [`compose_with_store`]: a reducer-driven [`Store`]
//!
//! The async adapters spawn onto the tokio runtime the container is created
//! in; stopping the subscription aborts the task.
//!
//! [`Signal`]: crate::reactive::Signal

mod future;
mod store;
mod stream;
mod tracker;

pub use future::compose_with_future;
pub use store::{compose_with_store, Reducer, Store};
pub use stream::compose_with_stream;
pub use tracker::compose_with_tracker;

/// Let spawned adapter tasks make progress.
#[cfg(test)]
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
