//! The Composer
//!
//! `compose(loader, options)` returns a [`Composer`]; wrapping a component
//! with it yields a [`ContainerType`], the container component. Nothing
//! subscribes until the host creates an instance.
//!
//! ```rust,ignore
//! let composer = compose(
//!     |props: &Props, callback: ResultCallback, _: &Context| {
//!         callback.data(Props::new().with("greeting", format!("hi {}", props.get_str("name").unwrap_or("?"))))?;
//!         Ok(None)
//!     },
//!     ComposeOptions::new().props_to_watch(["name"]),
//! );
//! let container = composer.wrap(Renderable::function("Greeting", render_greeting))?;
//! assert_eq!(container.display_name(), "Container(Greeting)");
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::component::{ComponentClass, Renderable, Statics};
use crate::container::{Container, ResultCallback};
use crate::error::{ComposeError, Result};
use crate::host::Scheduler;
use crate::loader::{DataLoader, LoadResult};
use crate::options::{ComposeOptions, Context};
use crate::policy::{SubscribePolicy, UpdatePolicy};
use crate::props::Props;

/// Everything a container instance needs from its type.
pub(crate) struct ContainerSpec {
    pub(crate) display_name: String,
    pub(crate) child: Renderable,
    pub(crate) base: Renderable,
    pub(crate) statics: Statics,
    pub(crate) loader: Arc<dyn DataLoader>,
    pub(crate) options: ComposeOptions,
    pub(crate) subscribe_policy: SubscribePolicy,
    pub(crate) update_policy: UpdatePolicy,
}

/// Build a composer from a loader closure.
pub fn compose<F>(loader: F, options: ComposeOptions) -> Composer
where
    F: Fn(&Props, ResultCallback, &Context) -> LoadResult + Send + Sync + 'static,
{
    Composer::from_loader(Arc::new(loader), options)
}

/// Wraps components into containers around one loader.
#[derive(Clone)]
pub struct Composer {
    loader: Arc<dyn DataLoader>,
    options: ComposeOptions,
}

impl Composer {
    pub fn from_loader(loader: Arc<dyn DataLoader>, options: ComposeOptions) -> Self {
        Self { loader, options }
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.options
    }

    /// Wrap `child` into a container type.
    ///
    /// Fails with [`ComposeError::InvalidArgument`] when there is no child.
    pub fn wrap(&self, child: impl Into<Option<Renderable>>) -> Result<ContainerType> {
        let child = child.into().ok_or_else(|| {
            ComposeError::InvalidArgument(
                "should provide a child component to build the higher order container".into(),
            )
        })?;

        let display_name = format!("Container({})", child.display_name());
        let base = child
            .downcast_class::<ContainerType>()
            .map_or_else(|| child.clone(), |inner| inner.original_base().clone());
        debug!(container = %display_name, "composing container");

        Ok(ContainerType {
            spec: Arc::new(ContainerSpec {
                statics: child.statics().hoisted(display_name.clone()),
                display_name,
                child,
                base,
                loader: Arc::clone(&self.loader),
                subscribe_policy: SubscribePolicy::from_options(&self.options),
                update_policy: UpdatePolicy::from_options(&self.options),
                options: self.options.clone(),
            }),
        })
    }
}

impl fmt::Debug for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composer")
            .field("options", &self.options)
            .finish()
    }
}

/// A container component type.
#[derive(Clone)]
pub struct ContainerType {
    spec: Arc<ContainerSpec>,
}

impl ContainerType {
    /// Create a live instance; the first subscription starts immediately.
    pub fn create(&self, props: Props, context: Context, scheduler: Arc<dyn Scheduler>) -> Result<Container> {
        Container::new(Arc::clone(&self.spec), props, context, scheduler)
    }

    pub fn display_name(&self) -> &str {
        &self.spec.display_name
    }

    /// The wrapped component.
    pub fn child(&self) -> &Renderable {
        &self.spec.child
    }

    /// The innermost non-container component of a stack of containers.
    pub fn original_base(&self) -> &Renderable {
        &self.spec.base
    }

    /// The options this container was built with.
    pub fn options(&self) -> &ComposeOptions {
        &self.spec.options
    }

    pub fn into_renderable(self) -> Renderable {
        Renderable::class(self)
    }
}

impl ComponentClass for ContainerType {
    fn type_name(&self) -> Option<&str> {
        Some(&self.spec.display_name)
    }

    fn statics(&self) -> &Statics {
        &self.spec.statics
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerType")
            .field("display_name", &self.spec.display_name)
            .field("options", &self.spec.options)
            .finish()
    }
}

/// A composer with default options.
///
/// Options passed to [`ComposerFactory::compose`] override the defaults field
/// by field.
#[derive(Debug, Clone, Default)]
pub struct ComposerFactory {
    defaults: ComposeOptions,
}

/// Shorthand for [`ComposerFactory::new`].
pub fn make_composer(defaults: ComposeOptions) -> ComposerFactory {
    ComposerFactory::new(defaults)
}

impl ComposerFactory {
    pub fn new(defaults: ComposeOptions) -> Self {
        Self { defaults }
    }

    pub fn compose<F>(&self, loader: F, options: ComposeOptions) -> Composer
    where
        F: Fn(&Props, ResultCallback, &Context) -> LoadResult + Send + Sync + 'static,
    {
        compose(loader, self.defaults.clone().merge(options))
    }
}

/// Apply several composers to `base`; the first composer wraps innermost.
pub fn compose_all<'a, I>(composers: I, base: impl Into<Option<Renderable>>) -> Result<Renderable>
where
    I: IntoIterator<Item = &'a Composer>,
{
    let base = base.into().ok_or_else(|| {
        ComposeError::InvalidArgument("compose_all needs a base component".into())
    })?;

    composers
        .into_iter()
        .try_fold(base, |component, composer| {
            composer.wrap(component).map(ContainerType::into_renderable)
        })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Element;

    fn noop() -> Composer {
        compose(
            |_: &Props, _: ResultCallback, _: &Context| Ok(None),
            ComposeOptions::new(),
        )
    }

    #[test]
    fn wrap_requires_a_child() {
        let err = noop().wrap(None::<Renderable>).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidArgument(_)));
    }

    #[test]
    fn display_name_and_statics_are_derived() {
        let child = Renderable::function("Comp", |_| Element::Empty)
            .with_statics(Statics::new().with_field("route", "/posts"));
        let container = noop().wrap(child).unwrap();

        assert_eq!(container.display_name(), "Container(Comp)");
        let statics = ComponentClass::statics(&container);
        assert_eq!(statics.display_name(), Some("Container(Comp)"));
        assert_eq!(statics.fields().get_str("route"), Some("/posts"));
    }

    #[test]
    fn anonymous_child_gets_fallback_name() {
        let container = noop().wrap(Renderable::anonymous(|_| Element::Empty)).unwrap();
        assert_eq!(container.display_name(), "Container(ChildComponent)");
    }

    #[test]
    fn compose_all_nests_and_keeps_base() {
        let base = Renderable::function("Comp", |_| Element::Empty);
        let first = noop();
        let second = noop();

        let composed = compose_all([&first, &second], base.clone()).unwrap();
        assert_eq!(composed.display_name(), "Container(Container(Comp))");

        let outer = composed.downcast_class::<ContainerType>().unwrap();
        assert!(outer.original_base().ptr_eq(&base));
        assert!(outer.child().downcast_class::<ContainerType>().is_some());
    }

    #[test]
    fn compose_all_requires_a_base() {
        let err = compose_all([&noop()], None::<Renderable>).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidArgument(_)));
    }

    #[test]
    fn factory_defaults_are_overridden() {
        let factory = make_composer(ComposeOptions::new().pure(true).with_ref(false));
        let composer = factory.compose(
            |_: &Props, _: ResultCallback, _: &Context| Ok(None),
            ComposeOptions::new().with_ref(true),
        );

        assert!(composer.options().is_pure());
        assert!(composer.options().wants_ref());
    }
}
