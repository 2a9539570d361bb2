//! Future Adapter
//!
//! Runs a one-shot async load per subscription on the ambient tokio runtime.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::compose::{compose, Composer};
use crate::container::ResultCallback;
use crate::error::{ComposeError, LoadError, Result};
use crate::loader::Stop;
use crate::options::{ComposeOptions, Context};
use crate::props::Props;

pub(crate) fn current_runtime(adapter: &str) -> Result<Handle> {
    Handle::try_current().map_err(|_| {
        ComposeError::InvalidArgument(format!("{adapter} needs a running tokio runtime"))
    })
}

/// Deliver one loaded value; it has to serialize to an object.
pub(crate) fn deliver<T: Serialize>(callback: &ResultCallback, outcome: std::result::Result<T, LoadError>) -> Result<()> {
    match outcome {
        Ok(value) => match Props::from_serialize(&value) {
            Ok(data) => callback.data(data),
            Err(err) => callback.error(err.into_load_error()),
        },
        Err(error) => callback.error(error),
    }
}

/// Compose with an async loader.
///
/// The container shows its loading state until the future resolves, then
/// the value (or the error). A new subscription or an unmount aborts the
/// pending future.
pub fn compose_with_future<F, Fut, T>(f: F, options: ComposeOptions) -> Composer
where
    F: Fn(&Props, &Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, LoadError>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let f = Arc::new(f);

    compose(
        move |props: &Props, callback: ResultCallback, context: &Context| {
            let runtime = current_runtime("compose_with_future")?;
            callback.loading()?;

            let future = f(props, context);
            let task = runtime.spawn(async move {
                let outcome = future.await;
                if let Err(err) = deliver(&callback, outcome) {
                    warn!(
                        container = %callback.container_name(),
                        error = %err,
                        "could not deliver future result"
                    );
                }
            });

            Ok(Some(Stop::new(move || {
                debug!("aborting pending future");
                task.abort();
            })))
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

    fn greeting() -> Renderable {
        Renderable::function("Greeting", |props: &Props| {
            Element::text(props.get_str("greeting").unwrap_or("?"))
        })
    }

    fn loading_options() -> ComposeOptions {
        ComposeOptions::new().loading_handler(|_: &Props| Element::text("loading"))
    }

    #[tokio::test]
    async fn resolved_value_becomes_data() {
        let container = compose_with_future(
            |props: &Props, _: &Context| {
                let name = props.get_str("name").unwrap_or_default().to_string();
                async move { Ok::<_, LoadError>(json!({ "greeting": format!("hi {name}") })) }
            },
            loading_options(),
        )
        .wrap(greeting())
        .unwrap();

        let host = Host::new();
        let mut mounted = host
            .mount(&container, Props::new().with("name", "ana"), Context::new())
            .unwrap();
        assert_eq!(mounted.markup(), "loading");

        settle().await;
        assert!(mounted.flush().unwrap());
        assert_eq!(mounted.markup(), "hi ana");
    }

    #[tokio::test]
    async fn rejection_becomes_error() {
        let container = compose_with_future(
            |_: &Props, _: &Context| async { Err::<Props, _>(DataError::shared("offline")) },
            loading_options().error_handler(|err| Element::text(format!("error: {err}"))),
        )
        .wrap(greeting())
        .unwrap();

        let mut mounted = Host::new()
            .mount(&container, Props::new(), Context::new())
            .unwrap();

        settle().await;
        mounted.flush().unwrap();
        assert_eq!(mounted.markup(), "error: offline");
    }

    #[tokio::test]
    async fn non_object_value_is_a_data_error() {
        let container = compose_with_future(
            |_: &Props, _: &Context| async { Ok::<_, LoadError>(42) },
            loading_options().error_handler(|_| Element::text("bad value")),
        )
        .wrap(greeting())
        .unwrap();

        let mut mounted = Host::new()
            .mount(&container, Props::new(), Context::new())
            .unwrap();

        settle().await;
        mounted.flush().unwrap();
        assert_eq!(mounted.markup(), "bad value");
        assert!(mounted.container().state().error.is_some());
    }

    #[tokio::test]
    async fn unmount_aborts_the_pending_future() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(parking_lot::Mutex::new(Some(rx)));
        let container = compose_with_future(
            move |_: &Props, _: &Context| {
                let rx = rx.lock().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok::<_, LoadError>(json!({ "greeting": "late" }))
                }
            },
            loading_options(),
        )
        .wrap(greeting())
        .unwrap();

        let host = Host::new();
        let mounted = host.mount(&container, Props::new(), Context::new()).unwrap();
        mounted.unmount();
        settle().await;

        assert!(tx.is_closed());
        assert!(host.queue().is_empty());
    }

    #[test]
    fn needs_a_tokio_runtime() {
        let container = compose_with_future(
            |_: &Props, _: &Context| async { Ok::<_, LoadError>(json!({})) },
            ComposeOptions::new(),
        )
        .wrap(greeting())
        .unwrap();

        let err = Host::new()
            .mount(&container, Props::new(), Context::new())
            .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidArgument(_)));
    }
}
