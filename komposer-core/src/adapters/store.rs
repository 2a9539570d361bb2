//! Store Adapter
//!
//! A [`Store`] is a reducer-driven state container. `compose_with_store`
//! runs a loader against the store state merged into the props, once on
//! subscribe and again after every store change.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use crate::compose::{compose, Composer};
use crate::container::ResultCallback;
use crate::error::{ComposeError, Result};
use crate::loader::Stop;
use crate::options::{ComposeOptions, Context};
use crate::props::Props;
use crate::reactive::{ListenerSet, SubscriberId};

/// Computes the next state from the current one and an action.
pub type Reducer = Arc<dyn Fn(&Props, &Value) -> Props + Send + Sync>;

/// Reducer-driven application state.
pub struct Store {
    state: RwLock<Props>,
    reducer: Reducer,
    listeners: ListenerSet,
}

impl Store {
    /// A store whose state only changes through [`Store::replace_state`].
    pub fn new(initial: Props) -> Self {
        Self::with_reducer(initial, |state: &Props, _: &Value| state.clone())
    }

    pub fn with_reducer<R>(initial: Props, reducer: R) -> Self
    where
        R: Fn(&Props, &Value) -> Props + Send + Sync + 'static,
    {
        Self {
            state: RwLock::new(initial),
            reducer: Arc::new(reducer),
            listeners: ListenerSet::new(),
        }
    }

    pub fn state(&self) -> Props {
        self.state.read().clone()
    }

    /// Reduce `action` into the state and notify listeners.
    pub fn dispatch(&self, action: Value) {
        {
            let mut state = self.state.write();
            let next = (self.reducer)(&state, &action);
            *state = next;
        }
        self.listeners.notify();
    }

    pub fn replace_state(&self, state: Props) {
        *self.state.write() = state;
        self.listeners.notify();
    }

    /// Call `listener` after every state change.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Find the store for one subscription: the one in the options, else the one
/// the context carries under the configured name.
fn resolve_store(options: &ComposeOptions, context: &Context) -> Result<Arc<Store>> {
    if let Some(store) = options.get_store() {
        return Ok(Arc::clone(store));
    }
    let name = options.get_store_name();
    context
        .get(name)
        .and_then(|value| value.downcast::<Store>())
        .ok_or_else(|| ComposeError::StoreNotFound(name.to_string()))
}

/// Compose with a loader fed by a [`Store`].
///
/// `f` receives the props with the store state merged over them.
pub fn compose_with_store<F>(f: F, options: ComposeOptions) -> Composer
where
    F: Fn(&Props, &ResultCallback, &Context) -> Result<()> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let store_options = options.clone();

    compose(
        move |props: &Props, callback: ResultCallback, context: &Context| {
            let store = resolve_store(&store_options, context)?;
            f(&props.merged(&store.state()), &callback, context)?;

            let listener = {
                let f = Arc::clone(&f);
                let weak: Weak<Store> = Arc::downgrade(&store);
                let props = props.clone();
                let context = context.clone();
                move || {
                    let Some(store) = weak.upgrade() else {
                        return;
                    };
                    if let Err(err) = f(&props.merged(&store.state()), &callback, &context) {
                        warn!(
                            container = %callback.container_name(),
                            error = %err,
                            "store listener failed"
                        );
                    }
                }
            };
            let id = store.subscribe(listener);
            debug!(listeners = store.listener_count(), "subscribed to store");

            Ok(Some(Stop::new(move || {
                store.unsubscribe(id);
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
    use crate::component::{Element, Renderable};
    use crate::host::Host;
    use crate::props::PropValue;
    use serde_json::json;

    fn counter_store() -> Arc<Store> {
        Arc::new(Store::with_reducer(
            Props::new().with("count", 0),
            |state: &Props, action: &Value| match action["type"].as_str() {
                Some("increment") => {
                    state.clone().with("count", state.get_i64("count").unwrap_or(0) + 1)
                }
                _ => state.clone(),
            },
        ))
    }

    fn count_view() -> Renderable {
        Renderable::function("Count", |props: &Props| {
            Element::text(props.get_i64("count").unwrap_or(-1).to_string())
        })
    }

    fn forward_count() -> impl Fn(&Props, &ResultCallback, &Context) -> Result<()> {
        |props: &Props, callback: &ResultCallback, _: &Context| {
            callback.data(props.pick(&["count"]))
        }
    }

    #[test]
    fn reducer_drives_state() {
        let store = counter_store();
        store.dispatch(json!({ "type": "increment" }));
        store.dispatch(json!({ "type": "unknown" }));
        assert_eq!(store.state().get_i64("count"), Some(1));
    }

    #[test]
    fn container_follows_dispatches() {
        let store = counter_store();
        let container = compose_with_store(forward_count(), ComposeOptions::new().store(store.clone()))
            .wrap(count_view())
            .unwrap();

        let host = Host::new();
        let mut mounted = host.mount(&container, Props::new(), Context::new()).unwrap();
        assert_eq!(mounted.markup(), "0");

        store.dispatch(json!({ "type": "increment" }));
        assert!(mounted.flush().unwrap());
        assert_eq!(mounted.markup(), "1");

        mounted.unmount();
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn store_is_found_in_context() {
        let store = counter_store();
        let container = compose_with_store(forward_count(), ComposeOptions::new().store_name("Main"))
            .wrap(count_view())
            .unwrap();
        let context = Context::new().with("Main", PropValue::from_arc(store.clone()));

        let host = Host::new();
        let mounted = host.mount(&container, Props::new(), context).unwrap();
        assert_eq!(mounted.markup(), "0");
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn missing_store_fails_construction() {
        let container = compose_with_store(forward_count(), ComposeOptions::new())
            .wrap(count_view())
            .unwrap();

        let err = Host::new()
            .mount(&container, Props::new(), Context::new())
            .unwrap_err();
        assert!(matches!(err, ComposeError::StoreNotFound(name) if name == "Store"));
    }

    #[test]
    fn state_overrides_props() {
        let store = counter_store();
        let container = compose_with_store(forward_count(), ComposeOptions::new().store(store))
            .wrap(count_view())
            .unwrap();

        let mounted = Host::new()
            .mount(&container, Props::new().with("count", 9), Context::new())
            .unwrap();
        assert_eq!(mounted.markup(), "0");
    }
}
