//! Compose Options
//!
//! Options are fixed when a component is wrapped. Every field is optional so
//! that option sets can be layered: a [`ComposerFactory`](crate::ComposerFactory)
//! holds defaults and each `compose` call overrides them field by field.
//!
//! The data-only subset of the options can also be loaded from JSON through
//! [`ComposeConfig`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::Store;
use crate::component::Element;
use crate::error::{LoadError, Result};
use crate::props::Props;

/// Extra values handed to every loader, alongside the host context.
pub type Context = Props;

/// Renders the error state.
pub type ErrorHandler = Arc<dyn Fn(&LoadError) -> Element + Send + Sync>;

/// Renders the loading state. Receives the container's own props.
pub type LoadingHandler = Arc<dyn Fn(&Props) -> Element + Send + Sync>;

/// `(current, next) -> bool` decision over two property bags.
pub type PropsPredicate = Arc<dyn Fn(&Props, &Props) -> bool + Send + Sync>;

/// Store lookup key used when no name is configured.
pub const DEFAULT_STORE_NAME: &str = "Store";

/// Which properties trigger a re-subscription.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WatchList {
    /// Any property change re-subscribes.
    #[default]
    All,
    /// Only changes to these properties re-subscribe. An empty list never
    /// re-subscribes after the first run.
    Only(Vec<String>),
}

/// Options recognised by [`compose`](crate::compose).
#[derive(Clone, Default)]
pub struct ComposeOptions {
    error_handler: Option<ErrorHandler>,
    loading_handler: Option<LoadingHandler>,
    env: Option<Context>,
    pure: Option<bool>,
    props_to_watch: Option<WatchList>,
    should_subscribe: Option<PropsPredicate>,
    should_update: Option<PropsPredicate>,
    with_ref: Option<bool>,
    store: Option<Arc<Store>>,
    store_name: Option<String>,
}

impl ComposeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render data errors with `handler` instead of failing the render.
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&LoadError) -> Element + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    pub fn loading_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Props) -> Element + Send + Sync + 'static,
    {
        self.loading_handler = Some(Arc::new(handler));
        self
    }

    pub fn env(mut self, env: Context) -> Self {
        self.env = Some(env);
        self
    }

    /// Skip re-renders when props, context and state are shallow-equal.
    pub fn pure(mut self, pure: bool) -> Self {
        self.pure = Some(pure);
        self
    }

    pub fn props_to_watch<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.props_to_watch = Some(WatchList::Only(keys.into_iter().map(Into::into).collect()));
        self
    }

    pub fn watch_all(mut self) -> Self {
        self.props_to_watch = Some(WatchList::All);
        self
    }

    /// Decide re-subscription from `(current_watched, next_watched)`.
    pub fn should_subscribe<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Props, &Props) -> bool + Send + Sync + 'static,
    {
        self.should_subscribe = Some(Arc::new(predicate));
        self
    }

    /// Decide re-rendering from `(current_props, next_props)`.
    pub fn should_update<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Props, &Props) -> bool + Send + Sync + 'static,
    {
        self.should_update = Some(Arc::new(predicate));
        self
    }

    pub fn with_ref(mut self, with_ref: bool) -> Self {
        self.with_ref = Some(with_ref);
        self
    }

    pub fn store(mut self, store: Arc<Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = Some(name.into());
        self
    }

    /// Layer `overrides` on top of `self`; fields set in `overrides` win.
    pub fn merge(self, overrides: ComposeOptions) -> ComposeOptions {
        ComposeOptions {
            error_handler: overrides.error_handler.or(self.error_handler),
            loading_handler: overrides.loading_handler.or(self.loading_handler),
            env: overrides.env.or(self.env),
            pure: overrides.pure.or(self.pure),
            props_to_watch: overrides.props_to_watch.or(self.props_to_watch),
            should_subscribe: overrides.should_subscribe.or(self.should_subscribe),
            should_update: overrides.should_update.or(self.should_update),
            with_ref: overrides.with_ref.or(self.with_ref),
            store: overrides.store.or(self.store),
            store_name: overrides.store_name.or(self.store_name),
        }
    }

    /// Options carrying the values set in `config`.
    pub fn from_config(config: &ComposeConfig) -> Self {
        ComposeOptions {
            pure: config.pure,
            props_to_watch: config.props_to_watch.clone().map(WatchList::Only),
            with_ref: config.with_ref,
            store_name: config.store_name.clone(),
            ..Default::default()
        }
    }

    pub fn get_error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    pub fn get_loading_handler(&self) -> Option<&LoadingHandler> {
        self.loading_handler.as_ref()
    }

    pub fn get_env(&self) -> Option<&Context> {
        self.env.as_ref()
    }

    pub fn is_pure(&self) -> bool {
        self.pure.unwrap_or(false)
    }

    pub fn watch_list(&self) -> WatchList {
        self.props_to_watch.clone().unwrap_or_default()
    }

    pub fn get_should_subscribe(&self) -> Option<&PropsPredicate> {
        self.should_subscribe.as_ref()
    }

    pub fn get_should_update(&self) -> Option<&PropsPredicate> {
        self.should_update.as_ref()
    }

    /// Whether the rendered child exposes its instance. On by default.
    pub fn wants_ref(&self) -> bool {
        self.with_ref.unwrap_or(true)
    }

    pub fn get_store(&self) -> Option<&Arc<Store>> {
        self.store.as_ref()
    }

    pub fn get_store_name(&self) -> &str {
        self.store_name.as_deref().unwrap_or(DEFAULT_STORE_NAME)
    }
}

impl fmt::Debug for ComposeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposeOptions")
            .field("error_handler", &self.error_handler.is_some())
            .field("loading_handler", &self.loading_handler.is_some())
            .field("env", &self.env)
            .field("pure", &self.pure)
            .field("props_to_watch", &self.props_to_watch)
            .field("should_subscribe", &self.should_subscribe.is_some())
            .field("should_update", &self.should_update.is_some())
            .field("with_ref", &self.with_ref)
            .field("store", &self.store.is_some())
            .field("store_name", &self.store_name)
            .finish()
    }
}

/// The serializable part of [`ComposeOptions`].
///
/// ```rust,ignore
/// let config = ComposeConfig::from_json(r#"{ "pure": true, "propsToWatch": ["id"] }"#)?;
/// let options = ComposeOptions::from_config(&config);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ComposeConfig {
    pub pure: Option<bool>,
    pub props_to_watch: Option<Vec<String>>,
    pub with_ref: Option<bool>,
    pub store_name: Option<String>,
}

impl ComposeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
