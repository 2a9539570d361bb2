//! Stream Adapter
//!
//! Forwards every item of a stream into the container until the
//! subscription is replaced or the container unmounts.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::future::{current_runtime, deliver};
use crate::compose::{compose, Composer};
use crate::container::ResultCallback;
use crate::error::LoadError;
use crate::loader::Stop;
use crate::options::{ComposeOptions, Context};
use crate::props::Props;

/// Compose with a loader that yields a stream of values.
///
/// Each `Ok` item replaces the data and each `Err` item is shown as the
/// error; the stream keeps being read after an error.
pub fn compose_with_stream<F, S, T>(f: F, options: ComposeOptions) -> Composer
where
    F: Fn(&Props, &Context) -> S + Send + Sync + 'static,
    S: Stream<Item = std::result::Result<T, LoadError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let f = Arc::new(f);

    compose(
        move |props: &Props, callback: ResultCallback, context: &Context| {
            let runtime = current_runtime("compose_with_stream")?;
            callback.loading()?;

            let stream = f(props, context);
            let task = runtime.spawn(async move {
                let mut stream = Box::pin(stream);
                while let Some(item) = stream.next().await {
                    if !callback.is_current() {
                        break;
                    }
                    if let Err(err) = deliver(&callback, item) {
                        warn!(
                            container = %callback.container_name(),
                            error = %err,
                            "could not deliver stream item"
                        );
                        break;
                    }
                }
                debug!(container = %callback.container_name(), "stream finished");
            });

            Ok(Some(Stop::new(move || task.abort())))
        },
        options,
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::settle;
    use crate::component::{Element, Renderable};
    use crate::error::DataError;
    use crate::host::Host;
    use serde_json::json;
    use tokio::sync::mpsc;

    type Sender = mpsc::UnboundedSender<std::result::Result<serde_json::Value, LoadError>>;

    fn ticker() -> Renderable {
        Renderable::function("Ticker", |props: &Props| {
            Element::text(props.get_i64("tick").unwrap_or(-1).to_string())
        })
    }

    /// A composer whose subscriptions read from channels handed out in order.
    fn channel_composer(options: ComposeOptions) -> (Composer, Arc<parking_lot::Mutex<Vec<Sender>>>) {
        let senders = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let registry = senders.clone();
        let composer = compose_with_stream(
            move |_: &Props, _: &Context| {
                let (tx, rx) = mpsc::unbounded_channel();
                registry.lock().push(tx);
                futures_util::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
            },
            options,
        );
        (composer, senders)
    }

    #[tokio::test]
    async fn every_item_replaces_the_data() {
        let (composer, senders) = channel_composer(ComposeOptions::new());
        let container = composer.wrap(ticker()).unwrap();
        let mut mounted = Host::new()
            .mount(&container, Props::new(), Context::new())
            .unwrap();
        assert_eq!(mounted.markup(), "");

        let tx = senders.lock()[0].clone();
        tx.send(Ok(json!({ "tick": 1 }))).unwrap();
        settle().await;
        mounted.flush().unwrap();
        assert_eq!(mounted.markup(), "1");

        tx.send(Ok(json!({ "tick": 2 }))).unwrap();
        settle().await;
        mounted.flush().unwrap();
        assert_eq!(mounted.markup(), "2");
    }

    #[tokio::test]
    async fn errors_do_not_end_the_stream() {
        let (composer, senders) = channel_composer(
            ComposeOptions::new().error_handler(|err| Element::text(format!("error: {err}"))),
        );
        let container = composer.wrap(ticker()).unwrap();
        let mut mounted = Host::new()
            .mount(&container, Props::new(), Context::new())
            .unwrap();

        let tx = senders.lock()[0].clone();
        tx.send(Err(DataError::shared("hiccup"))).unwrap();
        settle().await;
        mounted.flush().unwrap();
        assert_eq!(mounted.markup(), "error: hiccup");

        tx.send(Ok(json!({ "tick": 3 }))).unwrap();
        settle().await;
        mounted.flush().unwrap();
        assert_eq!(mounted.markup(), "3");
    }

    #[tokio::test]
    async fn resubscribing_disposes_the_previous_stream() {
        let (composer, senders) = channel_composer(ComposeOptions::new().props_to_watch(["id"]));
        let container = composer.wrap(ticker()).unwrap();
        let mut mounted = Host::new()
            .mount(&container, Props::new().with("id", 1), Context::new())
            .unwrap();

        mounted.set_props(Props::new().with("id", 2)).unwrap();
        settle().await;

        let senders = senders.lock();
        assert_eq!(senders.len(), 2);
        assert!(senders[0].is_closed());
        assert!(!senders[1].is_closed());
    }
}
